use crate::config::Config;
use crate::error::FeedError;
use crate::models::{FeedDocument, Sport};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Where a feed document can be loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// `GET <url>?sport=<key>`
    Remote(String),
    /// Static JSON file; `{sport}` in the path is replaced with the sport key
    File(String),
}

impl FeedSource {
    fn resolve(&self, sport: Sport) -> String {
        match self {
            FeedSource::Remote(url) => url.clone(),
            FeedSource::File(path) => path.replace("{sport}", sport.key()),
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Remote(url) => write!(f, "remote {}", url),
            FeedSource::File(path) => write!(f, "file {}", path),
        }
    }
}

/// Loads feed documents, trying each source in order until one succeeds
pub struct FeedClient {
    sources: Vec<FeedSource>,
    timeout: Duration,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(sources: Vec<FeedSource>, timeout: Duration) -> Self {
        Self {
            sources,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Remote feed endpoint first, then the static fallback files
    pub fn from_config(config: &Config) -> Self {
        let mut sources = vec![FeedSource::Remote(config.feed_url.clone())];
        sources.extend(config.fallback_files.iter().cloned().map(FeedSource::File));
        Self::new(sources, config.feed_timeout)
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    /// Fetch the feed for `sport`. Each source is bounded by the timeout;
    /// the error lists every source's failure when all of them fail.
    pub async fn fetch(&self, sport: Sport) -> Result<FeedDocument, FeedError> {
        if self.sources.is_empty() {
            return Err(FeedError::NoSources);
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match self.fetch_from(source, sport).await {
                Ok(feed) => {
                    info!(
                        "Loaded {} feed from {} ({} games)",
                        sport,
                        source,
                        feed.games.len()
                    );
                    return Ok(feed);
                }
                Err(e) => {
                    warn!("Feed source {} failed: {}", source, e);
                    failures.push(format!("{}: {}", source, e));
                }
            }
        }

        Err(FeedError::AllSourcesFailed(failures))
    }

    async fn fetch_from(
        &self,
        source: &FeedSource,
        sport: Sport,
    ) -> Result<FeedDocument, FeedError> {
        let location = source.resolve(sport);
        let load = async {
            match source {
                FeedSource::Remote(_) => self.fetch_remote(&location, sport).await,
                FeedSource::File(_) => Self::read_file(&location).await,
            }
        };

        tokio::time::timeout(self.timeout, load)
            .await
            .map_err(|_| FeedError::Timeout(location.clone()))?
    }

    async fn fetch_remote(&self, url: &str, sport: Sport) -> Result<FeedDocument, FeedError> {
        let response = self
            .client
            .get(url)
            .query(&[("sport", sport.key())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout(url.to_string())
                } else {
                    FeedError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn read_file(path: &str) -> Result<FeedDocument, FeedError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FeedError::Io {
                path: path.to_string(),
                source,
            })?;
        Ok(serde_json::from_str(&json)?)
    }
}
