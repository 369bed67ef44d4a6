pub mod feed_client;
pub mod unabated_api;

pub use feed_client::{FeedClient, FeedSource};
pub use unabated_api::{process_snapshot, UnabatedApiClient, UnabatedSnapshot};
