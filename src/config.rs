use crate::error::ConfigError;
use chrono_tz::Tz;
use std::str::FromStr;
use std::time::Duration;

pub const UNABATED_BASE_URL: &str = "https://partner-api.unabated.com";
pub const GAME_ODDS_ENDPOINT: &str = "/v2/markets/gameOdds";
pub const MARKET_SOURCES_ENDPOINT: &str = "/v2/marketSources";
pub const TEAMS_ENDPOINT: &str = "/v2/teams";
pub const USER_AGENT: &str = "MLB-Odds-Feed/2.0";
pub const SOURCE_NAME: &str = "Unabated API v2.0";

/// Sportsbooks shown as columns, in display order
pub const SUPPORTED_SPORTSBOOKS: &[&str] = &[
    "Pinnacle",
    "Circa",
    "FanDuel",
    "DraftKings",
    "BetMGM",
    "Bovada",
    "BetOnline",
    "Bookmaker",
    "BetRivers",
    "Caesars",
    "PointsBet",
    "WynnBET",
];

/// Static feeds tried, in order, when the feed endpoint is unreachable.
/// `{sport}` is replaced with the sport key.
pub const FALLBACK_FEED_FILES: &[&str] = &["data/sample_output.json", "data/test_output.json"];

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_timeout: Duration,
    pub max_retries: u32,
    /// Where the board fetches its feed from (FEED_URL)
    pub feed_url: String,
    pub fallback_files: Vec<String>,
    pub feed_timeout: Duration,
    pub cache_duration: Duration,
    pub sportsbooks: Vec<String>,
    pub timezone: Tz,
    pub logo_dir: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: UNABATED_BASE_URL.to_string(),
            api_timeout: Duration::from_secs(30),
            max_retries: 3,
            feed_url: "http://127.0.0.1:5000/feed".to_string(),
            fallback_files: FALLBACK_FEED_FILES.iter().map(|s| s.to_string()).collect(),
            feed_timeout: Duration::from_secs(10),
            cache_duration: Duration::from_secs(5 * 60),
            sportsbooks: SUPPORTED_SPORTSBOOKS.iter().map(|s| s.to_string()).collect(),
            timezone: chrono_tz::America::New_York,
            logo_dir: "logos".to_string(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Build the config from the process environment (after `.env` is loaded)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = parse_or("PORT", lookup("PORT"), defaults.port)?;

        Ok(Self {
            api_key: lookup("UNABATED_API_KEY").filter(|key| !key.trim().is_empty()),
            base_url: lookup("UNABATED_BASE_URL").unwrap_or(defaults.base_url),
            api_timeout: Duration::from_secs(parse_or(
                "API_TIMEOUT_SECS",
                lookup("API_TIMEOUT_SECS"),
                defaults.api_timeout.as_secs(),
            )?),
            max_retries: parse_or("API_MAX_RETRIES", lookup("API_MAX_RETRIES"), defaults.max_retries)?,
            feed_url: lookup("FEED_URL").unwrap_or_else(|| format!("http://127.0.0.1:{}/feed", port)),
            fallback_files: lookup("FEED_FALLBACK_FILES")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.fallback_files),
            feed_timeout: Duration::from_secs(parse_or(
                "FEED_TIMEOUT_SECS",
                lookup("FEED_TIMEOUT_SECS"),
                defaults.feed_timeout.as_secs(),
            )?),
            cache_duration: Duration::from_secs(
                parse_or::<u64>(
                    "CACHE_DURATION_MINUTES",
                    lookup("CACHE_DURATION_MINUTES"),
                    defaults.cache_duration.as_secs() / 60,
                )? * 60,
            ),
            sportsbooks: lookup("SPORTSBOOKS")
                .map(|raw| split_list(&raw))
                .filter(|books| !books.is_empty())
                .unwrap_or(defaults.sportsbooks),
            timezone: parse_or("TARGET_TIMEZONE", lookup("TARGET_TIMEZONE"), defaults.timezone)?,
            logo_dir: lookup("LOGO_DIR").unwrap_or(defaults.logo_dir),
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::Missing("UNABATED_API_KEY"))
    }

    pub fn cache_duration_minutes(&self) -> u64 {
        self.cache_duration.as_secs() / 60
    }

    pub fn tracing_level(&self) -> tracing::Level {
        tracing::Level::from_str(&self.log_level).unwrap_or(tracing::Level::INFO)
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
