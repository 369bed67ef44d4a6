use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sports we can build a feed for. The key selects the feed, the league id
/// selects events out of the upstream snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nfl,
    Ncaaf,
    Nba,
    Ncaab,
    #[default]
    Mlb,
    Nhl,
}

impl Sport {
    pub const ALL: [Sport; 6] = [
        Sport::Mlb,
        Sport::Nfl,
        Sport::Nba,
        Sport::Nhl,
        Sport::Ncaaf,
        Sport::Ncaab,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Sport::Nfl => "nfl",
            Sport::Ncaaf => "ncaaf",
            Sport::Nba => "nba",
            Sport::Ncaab => "ncaab",
            Sport::Mlb => "mlb",
            Sport::Nhl => "nhl",
        }
    }

    /// Unabated league id
    pub fn league_id(&self) -> u32 {
        match self {
            Sport::Nfl => 1,
            Sport::Ncaaf => 2,
            Sport::Nba => 3,
            Sport::Ncaab => 4,
            Sport::Mlb => 5,
            Sport::Nhl => 6,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Sport::Nfl => "NFL",
            Sport::Ncaaf => "NCAAF",
            Sport::Nba => "NBA",
            Sport::Ncaab => "NCAAB",
            Sport::Mlb => "MLB",
            Sport::Nhl => "NHL",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Sport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sport::ALL
            .into_iter()
            .find(|sport| sport.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sport: {}", s))
    }
}

/// Market types carried in every game's odds map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spread,
    #[default]
    Moneyline,
    Total,
}

impl MarketType {
    pub const ALL: [MarketType; 3] = [MarketType::Spread, MarketType::Moneyline, MarketType::Total];

    pub fn key(&self) -> &'static str {
        match self {
            MarketType::Spread => "spread",
            MarketType::Moneyline => "moneyline",
            MarketType::Total => "total",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MarketType::Spread => "Spread",
            MarketType::Moneyline => "Moneyline",
            MarketType::Total => "Total",
        }
    }

    /// The two sides a quote in this market prices
    pub fn sides(&self) -> [Side; 2] {
        match self {
            MarketType::Total => [Side::Over, Side::Under],
            _ => [Side::Away, Side::Home],
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MarketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketType::ALL
            .into_iter()
            .find(|market| market.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown market type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Away,
    Home,
    Over,
    Under,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Away => "Away",
            Side::Home => "Home",
            Side::Over => "Over",
            Side::Under => "Under",
        }
    }
}

/// One side of a moneyline quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MoneylineSide {
    pub odds: Option<i32>, // American odds format (e.g., -110, +150)
}

/// One side of a spread quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SpreadSide {
    pub odds: Option<i32>,
    pub spread: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneylineQuote {
    pub sportsbook: String,
    #[serde(default)]
    pub away_team: MoneylineSide,
    #[serde(default)]
    pub home_team: MoneylineSide,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadQuote {
    pub sportsbook: String,
    #[serde(default)]
    pub away_team: SpreadSide,
    #[serde(default)]
    pub home_team: SpreadSide,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalQuote {
    pub sportsbook: String,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub over: MoneylineSide,
    #[serde(default)]
    pub under: MoneylineSide,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// A single sportsbook's price for one market of one game
pub trait Quote {
    fn sportsbook(&self) -> &str;

    fn last_updated(&self) -> Option<&str>;

    /// Price and line (spread or total) for one side
    fn side(&self, side: Side) -> Option<(i32, Option<f64>)>;
}

impl Quote for MoneylineQuote {
    fn sportsbook(&self) -> &str {
        &self.sportsbook
    }

    fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    fn side(&self, side: Side) -> Option<(i32, Option<f64>)> {
        match side {
            Side::Away => self.away_team.odds.map(|odds| (odds, None)),
            Side::Home => self.home_team.odds.map(|odds| (odds, None)),
            _ => None,
        }
    }
}

impl Quote for SpreadQuote {
    fn sportsbook(&self) -> &str {
        &self.sportsbook
    }

    fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    fn side(&self, side: Side) -> Option<(i32, Option<f64>)> {
        let line = match side {
            Side::Away => &self.away_team,
            Side::Home => &self.home_team,
            _ => return None,
        };
        line.odds.map(|odds| (odds, line.spread))
    }
}

impl Quote for TotalQuote {
    fn sportsbook(&self) -> &str {
        &self.sportsbook
    }

    fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    fn side(&self, side: Side) -> Option<(i32, Option<f64>)> {
        match side {
            Side::Over => self.over.odds.map(|odds| (odds, self.total)),
            Side::Under => self.under.odds.map(|odds| (odds, self.total)),
            _ => None,
        }
    }
}

/// Per-market quote lists for one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameOdds {
    #[serde(default)]
    pub spread: Vec<SpreadQuote>,
    #[serde(default)]
    pub moneyline: Vec<MoneylineQuote>,
    #[serde(default)]
    pub total: Vec<TotalQuote>,
}

impl GameOdds {
    /// Quotes for one market, erased to the common quote view
    pub fn quotes(&self, market: MarketType) -> Vec<&dyn Quote> {
        match market {
            MarketType::Spread => self.spread.iter().map(|q| q as &dyn Quote).collect(),
            MarketType::Moneyline => self.moneyline.iter().map(|q| q as &dyn Quote).collect(),
            MarketType::Total => self.total.iter().map(|q| q as &dyn Quote).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spread.is_empty() && self.moneyline.is_empty() && self.total.is_empty()
    }
}

/// A game as it appears in the feed document. Team names and kickoff are
/// optional so a single malformed record cannot fail the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Game {
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub game_time: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_clock: Option<String>,
    #[serde(default)]
    pub odds: GameOdds,
}

impl Game {
    /// Kickoff as a UTC instant, if present and parseable
    pub fn kickoff(&self) -> Option<DateTime<Utc>> {
        self.game_time.as_deref().and_then(parse_timestamp)
    }
}

/// Metadata block at the top of a feed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeedInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub total_games: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_sportsbooks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_types: Option<Vec<MarketType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The `{feed_info, games}` document served at `/feed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeedDocument {
    #[serde(default)]
    pub feed_info: FeedInfo,
    #[serde(default)]
    pub games: Vec<Game>,
}

impl FeedDocument {
    /// Feed carrying no games and an error message
    pub fn error(sport: Sport, source: &str, message: impl Into<String>) -> Self {
        Self {
            feed_info: FeedInfo {
                title: format!("{} Odds Feed - Error", sport.title()),
                description: "Error occurred while fetching odds data".to_string(),
                generated_at: Utc::now().to_rfc3339(),
                source: source.to_string(),
                error: Some(message.into()),
                total_games: 0,
                ..Default::default()
            },
            games: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.feed_info.error.is_some()
    }
}

/// Parse an upstream timestamp. Accepts RFC 3339 and naive ISO-8601
/// (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
