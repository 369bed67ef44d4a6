use crate::models::{FeedDocument, Sport};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Save any serializable value to a JSON file
pub fn save_json<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<()> {
    let path = path.as_ref();
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize data")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load a JSON file into any deserializable value
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to deserialize {}", path.display()))
}

/// Save a feed document to a JSON file
pub fn save_feed(feed: &FeedDocument, path: impl AsRef<Path>, pretty: bool) -> Result<()> {
    save_json(feed, path, pretty)
}

/// Load a feed document from a JSON file
pub fn load_feed(path: impl AsRef<Path>) -> Result<FeedDocument> {
    load_json(path)
}

/// Timestamped dump name, e.g. `mlb_odds_20250116_142500.json`
pub fn feed_file_name(sport: Sport, at: DateTime<Local>) -> String {
    format!("{}_odds_{}.json", sport.key(), at.format("%Y%m%d_%H%M%S"))
}
