pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use api::*;
pub use board::*;
pub use config::Config;
pub use error::{ConfigError, FeedError};
pub use models::*;
pub use utils::*;

use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Generate a fresh feed document for `sport` straight from the upstream API
pub async fn build_feed(config: &Config, sport: Sport) -> Result<FeedDocument> {
    let client = UnabatedApiClient::from_config(config).context("Upstream API is not configured")?;
    client
        .generate_feed(sport)
        .await
        .with_context(|| format!("Failed to generate {} feed", sport))
}

/// Load the board for one sport, market and date through the feed sources
pub async fn load_board(
    config: &Config,
    sport: Sport,
    market: MarketType,
    date: NaiveDate,
) -> BoardView {
    let client = FeedClient::from_config(config);
    let options = RenderOptions::from_config(config);

    let mut state = AppState::new(sport, market, date);
    dispatch(&mut state, Action::Refresh, &client).await;
    render(&state, &options)
}
