use thiserror::Error;

/// Failures while fetching a feed or the upstream snapshot
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("authentication failed, check the API key")]
    Unauthorized,

    #[error("access forbidden, check API permissions")]
    Forbidden,

    #[error("failed to complete request after {0} attempts")]
    RetriesExhausted(u32),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("no feed source succeeded ({})", .0.join("; "))]
    AllSourcesFailed(Vec<String>),

    #[error("no feed sources configured")]
    NoSources,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
