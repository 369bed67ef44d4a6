pub mod data;
pub mod date_filter;
pub mod feed_cache;
pub mod normalizer;
pub mod odds_selector;
