use crate::config::{
    Config, GAME_ODDS_ENDPOINT, MARKET_SOURCES_ENDPOINT, SOURCE_NAME, TEAMS_ENDPOINT, USER_AGENT,
};
use crate::error::FeedError;
use crate::models::{
    FeedDocument, FeedInfo, Game, GameOdds, MarketType, MoneylineQuote, MoneylineSide, Sport,
    SpreadQuote, SpreadSide, TotalQuote,
};
use chrono::Utc;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Market source (sportsbook) from the Unabated API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnabatedMarketSource {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnabatedTeam {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// Full game odds snapshot. Events are kept as raw JSON so one malformed
/// event cannot fail the whole snapshot.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnabatedSnapshot {
    #[serde(default)]
    pub market_sources: Vec<UnabatedMarketSource>,
    #[serde(default)]
    pub teams: Vec<UnabatedTeam>,
    #[serde(default)]
    pub game_odds_events: BTreeMap<String, Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnabatedEvent {
    event_id: Option<i64>,
    event_start: Option<String>,
    status_id: Option<i32>,
    #[serde(default)]
    event_teams: HashMap<String, UnabatedEventTeam>,
    game_clock: Option<String>,
    /// Keyed `si{side}:ms{market_source}:an{alternate}`, then by `bt{bet_type}`
    #[serde(default, alias = "gameOddsMarketSourceLines")]
    game_odds_market_sources_lines: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnabatedEventTeam {
    id: Option<i64>,
    score: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UnabatedMarketLine {
    american_price: Option<f64>,
    points: Option<f64>,
    modified_on: Option<String>,
}

/// Parsed `si0:ms7:an0` market line key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineKey {
    pub side: u32,
    pub market_source: i64,
    pub alternate: u32,
}

impl LineKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(':');
        let side = parts.next()?.strip_prefix("si")?.parse().ok()?;
        let market_source = parts.next()?.strip_prefix("ms")?.parse().ok()?;
        let alternate = parts.next()?.strip_prefix("an")?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            side,
            market_source,
            alternate,
        })
    }
}

fn market_for_bet_type(bet_type: u32) -> Option<MarketType> {
    match bet_type {
        1 => Some(MarketType::Moneyline),
        2 => Some(MarketType::Spread), // run line in MLB
        3 => Some(MarketType::Total),
        _ => None,
    }
}

pub fn status_name(status_id: i32) -> &'static str {
    match status_id {
        1 => "Pre-game",
        2 => "Live",
        3 => "Final",
        4 => "Delayed",
        5 => "Postponed",
        6 => "Cancelled",
        _ => "Unknown",
    }
}

pub struct UnabatedApiClient {
    api_key: String,
    base_url: String,
    max_retries: u32,
    timeout: Duration,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl UnabatedApiClient {
    pub fn new(api_key: String) -> Self {
        let config = Config::default();
        Self {
            api_key,
            base_url: config.base_url,
            max_retries: config.max_retries,
            timeout: config.api_timeout,
            retry_delay: Duration::from_secs(1),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, crate::error::ConfigError> {
        Ok(Self::new(config.require_api_key()?.to_string())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.api_timeout)
            .with_max_retries(config.max_retries))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Base delay between attempts; rate limiting backs off exponentially from it
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn redact(&self, url: &str) -> String {
        url.replace(&self.api_key, "***API_KEY***")
    }

    /// GET an endpoint with the API key as a query parameter, retrying
    /// timeouts, transport errors, server errors and rate limiting
    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let url = format!("{}{}", self.base_url, endpoint);

        for attempt in 0..self.max_retries {
            let is_last = attempt + 1 == self.max_retries;
            let result = self
                .client
                .get(&url)
                .query(params)
                .query(&[("x-api-key", self.api_key.as_str())])
                .header("Content-Type", "application/json")
                .header("User-Agent", USER_AGENT)
                .timeout(self.timeout)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(
                        "Request timeout (attempt {}/{})",
                        attempt + 1,
                        self.max_retries
                    );
                    if !is_last {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    continue;
                }
                Err(e) => {
                    error!(
                        "Request error (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        self.redact(&e.to_string())
                    );
                    if !is_last {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    continue;
                }
            };

            debug!("Request: {}", self.redact(response.url().as_str()));
            debug!("Status: {}", response.status());

            match response.status() {
                StatusCode::UNAUTHORIZED => {
                    error!("Authentication failed - check API key");
                    return Err(FeedError::Unauthorized);
                }
                StatusCode::FORBIDDEN => {
                    error!("Access forbidden - check API permissions");
                    return Err(FeedError::Forbidden);
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!("Rate limit exceeded, waiting...");
                    tokio::time::sleep(self.retry_delay * 2u32.pow(attempt)).await;
                    continue;
                }
                status if !status.is_success() => {
                    error!(
                        "Request error (attempt {}/{}): status {}",
                        attempt + 1,
                        self.max_retries,
                        status
                    );
                    if !is_last {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    continue;
                }
                _ => {}
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    error!("Failed to read response body: {}", e);
                    continue;
                }
            };

            return serde_json::from_str(&body).map_err(|e| {
                error!("JSON decode error: {}", e);
                FeedError::Json(e)
            });
        }

        error!(
            "Failed to complete request after {} attempts",
            self.max_retries
        );
        Err(FeedError::RetriesExhausted(self.max_retries))
    }

    /// Fetch the complete snapshot of current game odds
    pub async fn fetch_game_odds_snapshot(&self) -> Result<UnabatedSnapshot, FeedError> {
        info!("Fetching game odds snapshot from Unabated API...");
        let snapshot: UnabatedSnapshot = self.request(GAME_ODDS_ENDPOINT, &[]).await?;
        info!("Successfully fetched game odds snapshot");
        Ok(snapshot)
    }

    pub async fn fetch_market_sources(&self) -> Result<Vec<UnabatedMarketSource>, FeedError> {
        info!("Fetching market sources...");
        let sources: Vec<UnabatedMarketSource> =
            self.request(MARKET_SOURCES_ENDPOINT, &[]).await?;
        info!("Successfully fetched {} market sources", sources.len());
        Ok(sources)
    }

    /// Teams for one league, with real names
    pub async fn fetch_teams(&self, sport: Sport) -> Result<Vec<UnabatedTeam>, FeedError> {
        info!("Fetching {} teams data...", sport.title());
        let teams: Vec<UnabatedTeam> = self
            .request(TEAMS_ENDPOINT, &[("leagues", sport.league_id().to_string())])
            .await?;
        info!("Successfully fetched {} {} teams", teams.len(), sport.title());
        Ok(teams)
    }

    /// Build the complete feed document for one sport.
    ///
    /// The snapshot is required; teams and market sources only enrich the
    /// result. An empty snapshot still yields a feed, flagged with an error.
    pub async fn generate_feed(&self, sport: Sport) -> Result<FeedDocument, FeedError> {
        info!("Starting {} odds feed generation using {}...", sport.title(), SOURCE_NAME);

        let teams = match self.fetch_teams(sport).await {
            Ok(teams) if !teams.is_empty() => Some(teams),
            Ok(_) | Err(_) => {
                warn!(
                    "Could not fetch {} teams data, team names may not be accurate",
                    sport.title()
                );
                None
            }
        };

        let mut snapshot = self.fetch_game_odds_snapshot().await?;
        if let Some(teams) = teams {
            snapshot.teams = teams;
        }

        let games = process_snapshot(&snapshot, sport);
        if games.is_empty() {
            warn!("No {} games could be processed from the API response", sport.title());
            return Ok(FeedDocument::error(
                sport,
                SOURCE_NAME,
                format!("No {} games could be processed from the API response", sport.title()),
            ));
        }

        let available_sportsbooks = match self.fetch_market_sources().await {
            Ok(sources) => sources
                .into_iter()
                .filter(|source| source.is_active)
                .map(|source| source.name.unwrap_or_else(|| "Unknown".to_string()))
                .collect(),
            Err(e) => {
                warn!("Could not fetch market sources: {}", e);
                Vec::new()
            }
        };

        info!("Successfully generated feed with {} {} games", games.len(), sport.title());
        Ok(FeedDocument {
            feed_info: FeedInfo {
                title: format!("{} Odds Feed - {}", sport.title(), SOURCE_NAME),
                description: format!(
                    "{} odds including spread, moneyline, and totals from all available sportsbooks via Unabated",
                    sport.title()
                ),
                generated_at: Utc::now().to_rfc3339(),
                source: SOURCE_NAME.to_string(),
                api_endpoint: Some(format!("{}{}", self.base_url, GAME_ODDS_ENDPOINT)),
                total_games: games.len(),
                available_sportsbooks: Some(available_sportsbooks),
                market_types: Some(MarketType::ALL.to_vec()),
                league: Some(format!("{} (League ID: {})", sport.title(), sport.league_id())),
                error: None,
            },
            games,
        })
    }
}

/// Turn a raw snapshot into feed games for one league
pub fn process_snapshot(snapshot: &UnabatedSnapshot, sport: Sport) -> Vec<Game> {
    let market_sources: HashMap<i64, &str> = snapshot
        .market_sources
        .iter()
        .filter_map(|source| source.name.as_deref().map(|name| (source.id, name)))
        .collect();
    let teams: HashMap<i64, &UnabatedTeam> =
        snapshot.teams.iter().map(|team| (team.id, team)).collect();

    let prefix = format!("lg{}:", sport.league_id());
    let mut games = Vec::new();

    for (key, events) in snapshot
        .game_odds_events
        .iter()
        .filter(|(key, _)| key.starts_with(&prefix))
    {
        debug!("Processing {} events for key {}", events.len(), key);
        for raw in events {
            let event: UnabatedEvent = match serde_json::from_value(raw.clone()) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping unreadable event under {}: {}", key, e);
                    continue;
                }
            };
            if let Some(game) = process_event(event, &market_sources, &teams) {
                games.push(game);
            }
        }
    }

    info!("Processed {} {} games from Unabated API", games.len(), sport.title());
    games
}

fn process_event(
    event: UnabatedEvent,
    market_sources: &HashMap<i64, &str>,
    teams: &HashMap<i64, &UnabatedTeam>,
) -> Option<Game> {
    let Some(event_id) = event.event_id else {
        warn!("Event missing eventId");
        return None;
    };

    // Side 0 is away, side 1 is home
    let (Some(away), Some(home)) = (event.event_teams.get("0"), event.event_teams.get("1")) else {
        warn!("Event {} missing team data", event_id);
        return None;
    };

    let team_name = |id: Option<i64>| -> String {
        id.and_then(|id| teams.get(&id))
            .and_then(|team| team.name.clone())
            .unwrap_or_else(|| match id {
                Some(id) => format!("Team {}", id),
                None => "Unknown Team".to_string(),
            })
    };
    let away_team = team_name(away.id);
    let home_team = team_name(home.id);

    let mut game = Game {
        game_id: event_id.to_string(),
        event_name: format!("{} at {}", away_team, home_team),
        game_time: event.event_start,
        away_team: Some(away_team),
        home_team: Some(home_team),
        status: status_name(event.status_id.unwrap_or(1)).to_string(),
        away_score: away.score,
        home_score: home.score,
        game_clock: event.game_clock,
        odds: GameOdds::default(),
    };

    for (line_key, bet_types) in &event.game_odds_market_sources_lines {
        let Some(key) = LineKey::parse(line_key) else {
            debug!("Skipping malformed line key: {}", line_key);
            continue;
        };
        // an0 is the main line
        if key.alternate != 0 {
            continue;
        }

        let sportsbook = market_sources
            .get(&key.market_source)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Book_{}", key.market_source));

        for (bet_type_key, raw_line) in bet_types {
            let Some(bet_type) = bet_type_key
                .strip_prefix("bt")
                .and_then(|id| id.parse::<u32>().ok())
            else {
                continue;
            };
            let Some(market) = market_for_bet_type(bet_type) else {
                debug!("Unknown bet type ID: {}", bet_type);
                continue;
            };
            let line: UnabatedMarketLine = match serde_json::from_value(raw_line.clone()) {
                Ok(line) => line,
                Err(e) => {
                    debug!("Error parsing market line {}/{}: {}", line_key, bet_type_key, e);
                    continue;
                }
            };
            add_market_line(&mut game.odds, market, &sportsbook, key.side, &line);
        }
    }

    Some(game)
}

/// Fold one side of one sportsbook's line into the game's quote list,
/// creating the quote the first time the sportsbook is seen
fn add_market_line(
    odds: &mut GameOdds,
    market: MarketType,
    sportsbook: &str,
    side: u32,
    line: &UnabatedMarketLine,
) {
    let price = line.american_price.map(|p| p.round() as i32);

    match market {
        MarketType::Moneyline => {
            let index = match odds.moneyline.iter().position(|q| q.sportsbook == sportsbook) {
                Some(index) => index,
                None => {
                    odds.moneyline.push(MoneylineQuote {
                        sportsbook: sportsbook.to_string(),
                        away_team: MoneylineSide::default(),
                        home_team: MoneylineSide::default(),
                        last_updated: line.modified_on.clone(),
                    });
                    odds.moneyline.len() - 1
                }
            };
            let quote = &mut odds.moneyline[index];
            if side == 0 {
                quote.away_team.odds = price;
            } else {
                quote.home_team.odds = price;
            }
        }
        MarketType::Spread => {
            let index = match odds.spread.iter().position(|q| q.sportsbook == sportsbook) {
                Some(index) => index,
                None => {
                    odds.spread.push(SpreadQuote {
                        sportsbook: sportsbook.to_string(),
                        away_team: SpreadSide::default(),
                        home_team: SpreadSide::default(),
                        last_updated: line.modified_on.clone(),
                    });
                    odds.spread.len() - 1
                }
            };
            let quote = &mut odds.spread[index];
            let target = if side == 0 {
                &mut quote.away_team
            } else {
                &mut quote.home_team
            };
            target.spread = line.points;
            target.odds = price;
        }
        MarketType::Total => {
            let index = match odds.total.iter().position(|q| q.sportsbook == sportsbook) {
                Some(index) => index,
                None => {
                    odds.total.push(TotalQuote {
                        sportsbook: sportsbook.to_string(),
                        total: line.points,
                        over: MoneylineSide::default(),
                        under: MoneylineSide::default(),
                        last_updated: line.modified_on.clone(),
                    });
                    odds.total.len() - 1
                }
            };
            let quote = &mut odds.total[index];
            // Side 0 is the over, side 1 the under
            if side == 0 {
                quote.over.odds = price;
            } else {
                quote.under.odds = price;
            }
        }
    }
}
