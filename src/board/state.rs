use crate::api::feed_client::FeedClient;
use crate::board::table::{render_table, BoardTable, RenderOptions};
use crate::models::{FeedDocument, MarketType, Sport};
use crate::utils::normalizer::normalize;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Everything the board shows, in one serializable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub sport: Sport,
    pub market: MarketType,
    pub date: NaiveDate,
    /// Last feed accepted for `sport`, games already normalized
    pub feed: Option<FeedDocument>,
    pub status: LoadStatus,
    /// Id of the most recently issued fetch; only its result is applied
    pub latest_request: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectSport(Sport),
    SelectMarket(MarketType),
    SetDate(NaiveDate),
    ShiftDate(i64),
    Refresh,
    FeedLoaded { request_id: u64, feed: FeedDocument },
    FetchFailed { request_id: u64, error: String },
}

/// A fetch the caller must perform and report back with the same id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub request_id: u64,
    pub sport: Sport,
}

impl AppState {
    pub fn new(sport: Sport, market: MarketType, date: NaiveDate) -> Self {
        Self {
            sport,
            market,
            date,
            feed: None,
            status: LoadStatus::Idle,
            latest_request: 0,
        }
    }

    fn issue_fetch(&mut self) -> Option<FetchRequest> {
        self.latest_request += 1;
        self.status = LoadStatus::Loading;
        Some(FetchRequest {
            request_id: self.latest_request,
            sport: self.sport,
        })
    }

    /// Apply one action. Returns the fetch to run when the action needs
    /// fresh data.
    pub fn apply(&mut self, action: Action) -> Option<FetchRequest> {
        match action {
            Action::SelectSport(sport) => {
                if sport == self.sport {
                    return None;
                }
                self.sport = sport;
                self.feed = None;
                self.issue_fetch()
            }
            Action::SelectMarket(market) => {
                self.market = market;
                None
            }
            Action::SetDate(date) => {
                if date == self.date {
                    return None;
                }
                self.date = date;
                self.issue_fetch()
            }
            Action::ShiftDate(days) => {
                match self.date.checked_add_signed(Duration::days(days)) {
                    Some(date) if days != 0 => {
                        self.date = date;
                        self.issue_fetch()
                    }
                    _ => None,
                }
            }
            Action::Refresh => self.issue_fetch(),
            Action::FeedLoaded { request_id, mut feed } => {
                if request_id != self.latest_request {
                    debug!(
                        "Dropping stale feed for request {} (latest {})",
                        request_id, self.latest_request
                    );
                    return None;
                }
                feed.games = normalize(feed.games);
                info!("Board loaded {} games for {}", feed.games.len(), self.sport);
                self.feed = Some(feed);
                self.status = LoadStatus::Loaded;
                None
            }
            Action::FetchFailed { request_id, error } => {
                if request_id != self.latest_request {
                    debug!("Dropping stale failure for request {}", request_id);
                    return None;
                }
                warn!("Board fetch failed: {}", error);
                self.status = LoadStatus::Failed(error);
                None
            }
        }
    }
}

/// Apply `action` and run any fetch it triggers to completion
pub async fn dispatch(state: &mut AppState, action: Action, client: &FeedClient) {
    let mut next = state.apply(action);
    while let Some(request) = next.take() {
        let result = match client.fetch(request.sport).await {
            Ok(feed) => Action::FeedLoaded {
                request_id: request.request_id,
                feed,
            },
            Err(e) => Action::FetchFailed {
                request_id: request.request_id,
                error: e.to_string(),
            },
        };
        next = state.apply(result);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavLink {
    pub key: String,
    pub title: String,
    pub active: bool,
}

/// Everything the board page needs, derived from `AppState`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardView {
    pub sport: Sport,
    pub sport_title: String,
    pub market: MarketType,
    pub date: String,
    pub sports: Vec<NavLink>,
    pub markets: Vec<NavLink>,
    pub loading: bool,
    pub notice: Option<String>,
    pub generated_at: Option<String>,
    pub source: Option<String>,
    pub table: BoardTable,
}

pub fn render(state: &AppState, options: &RenderOptions) -> BoardView {
    let games = state
        .feed
        .as_ref()
        .map(|feed| feed.games.as_slice())
        .unwrap_or(&[]);
    let table = render_table(games, state.date, state.market, options);

    let notice = match &state.status {
        LoadStatus::Failed(error) => Some(format!("Could not load odds: {}", error)),
        _ => state
            .feed
            .as_ref()
            .and_then(|feed| feed.feed_info.error.as_ref())
            .map(|error| format!("Feed reported an error: {}", error)),
    };

    BoardView {
        sport: state.sport,
        sport_title: state.sport.title().to_string(),
        market: state.market,
        date: state.date.format("%Y-%m-%d").to_string(),
        sports: Sport::ALL
            .iter()
            .map(|sport| NavLink {
                key: sport.key().to_string(),
                title: sport.title().to_string(),
                active: *sport == state.sport,
            })
            .collect(),
        markets: MarketType::ALL
            .iter()
            .map(|market| NavLink {
                key: market.key().to_string(),
                title: market.title().to_string(),
                active: *market == state.market,
            })
            .collect(),
        loading: state.status == LoadStatus::Loading,
        notice,
        generated_at: state
            .feed
            .as_ref()
            .map(|feed| feed.feed_info.generated_at.clone())
            .filter(|at| !at.is_empty()),
        source: state
            .feed
            .as_ref()
            .map(|feed| feed.feed_info.source.clone())
            .filter(|source| !source.is_empty()),
        table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::feed_client::FeedSource;
    use crate::board::logos::LogoResolver;
    use crate::models::{FeedInfo, Game};
    use std::collections::HashSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn options() -> RenderOptions {
        RenderOptions {
            timezone: chrono_tz::America::New_York,
            sportsbooks: vec!["FanDuel".to_string(), "DraftKings".to_string()],
            logos: LogoResolver::new("logos", HashSet::new()),
        }
    }

    fn feed_with(game_ids: &[&str]) -> FeedDocument {
        FeedDocument {
            feed_info: FeedInfo {
                total_games: game_ids.len(),
                ..Default::default()
            },
            games: game_ids
                .iter()
                .map(|id| Game {
                    game_id: id.to_string(),
                    away_team: Some("New York Yankees".to_string()),
                    home_team: Some("Boston Red Sox".to_string()),
                    game_time: Some("2025-06-02T23:10:00Z".to_string()),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_fetching_actions_issue_increasing_ids() {
        let mut state = AppState::new(Sport::Mlb, MarketType::Moneyline, day(2));

        let first = state.apply(Action::Refresh).unwrap();
        assert_eq!(first.request_id, 1);
        assert_eq!(state.status, LoadStatus::Loading);

        let second = state.apply(Action::SelectSport(Sport::Nba)).unwrap();
        assert_eq!(second.request_id, 2);
        assert_eq!(second.sport, Sport::Nba);

        let third = state.apply(Action::ShiftDate(1)).unwrap();
        assert_eq!(third.request_id, 3);
        assert_eq!(state.date, day(3));

        let fourth = state.apply(Action::SetDate(day(10))).unwrap();
        assert_eq!(fourth.request_id, 4);
    }

    #[test]
    fn test_market_change_and_noops_do_not_fetch() {
        let mut state = AppState::new(Sport::Mlb, MarketType::Moneyline, day(2));
        assert!(state.apply(Action::SelectMarket(MarketType::Total)).is_none());
        assert_eq!(state.market, MarketType::Total);
        assert!(state.apply(Action::SelectSport(Sport::Mlb)).is_none());
        assert!(state.apply(Action::SetDate(day(2))).is_none());
        assert!(state.apply(Action::ShiftDate(0)).is_none());
        assert_eq!(state.latest_request, 0);
        assert_eq!(state.status, LoadStatus::Idle);
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let mut state = AppState::new(Sport::Mlb, MarketType::Moneyline, day(2));
        let old = state.apply(Action::Refresh).unwrap();
        let new = state.apply(Action::ShiftDate(-1)).unwrap();

        // The older request resolves last but must not overwrite
        state.apply(Action::FeedLoaded {
            request_id: new.request_id,
            feed: feed_with(&["new"]),
        });
        state.apply(Action::FeedLoaded {
            request_id: old.request_id,
            feed: feed_with(&["old"]),
        });
        state.apply(Action::FetchFailed {
            request_id: old.request_id,
            error: "late failure".to_string(),
        });

        assert_eq!(state.status, LoadStatus::Loaded);
        assert_eq!(state.feed.as_ref().unwrap().games[0].game_id, "new");
    }

    #[test]
    fn test_loaded_feed_is_normalized() {
        let mut state = AppState::new(Sport::Mlb, MarketType::Moneyline, day(2));
        let request = state.apply(Action::Refresh).unwrap();
        state.apply(Action::FeedLoaded {
            request_id: request.request_id,
            feed: feed_with(&["a", "b", "c"]),
        });
        assert_eq!(state.feed.unwrap().games.len(), 1);
    }

    #[test]
    fn test_failure_renders_notice() {
        let mut state = AppState::new(Sport::Mlb, MarketType::Spread, day(2));
        let request = state.apply(Action::Refresh).unwrap();
        state.apply(Action::FetchFailed {
            request_id: request.request_id,
            error: "no feed source succeeded".to_string(),
        });

        let view = render(&state, &options());
        assert_eq!(
            view.notice.as_deref(),
            Some("Could not load odds: no feed source succeeded")
        );
        assert!(!view.loading);
        assert_eq!(view.table.rows.len(), 1);
        assert!(view.markets.iter().any(|m| m.key == "spread" && m.active));
    }

    #[test]
    fn test_render_is_pure() {
        let mut state = AppState::new(Sport::Mlb, MarketType::Moneyline, day(2));
        let request = state.apply(Action::Refresh).unwrap();
        state.apply(Action::FeedLoaded {
            request_id: request.request_id,
            feed: feed_with(&["a"]),
        });

        let before = state.clone();
        let first = render(&state, &options());
        let second = render(&state, &options());
        assert_eq!(first, second);
        assert_eq!(state, before);
        assert_eq!(first.table.game_count, 1);
        assert!(first.notice.is_none());
    }

    #[test]
    fn test_state_serializes() {
        let state = AppState::new(Sport::Mlb, MarketType::Total, day(2));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["sport"], "mlb");
        assert_eq!(json["market"], "total");
        assert_eq!(json["date"], "2025-06-02");
        assert_eq!(json["status"]["state"], "idle");
    }

    #[tokio::test]
    async fn test_dispatch_runs_fetch() {
        let client = FeedClient::new(
            vec![FeedSource::File("data/sample_output.json".to_string())],
            std::time::Duration::from_secs(5),
        );
        let mut state = AppState::new(Sport::Mlb, MarketType::Moneyline, day(2));
        dispatch(&mut state, Action::Refresh, &client).await;

        assert_eq!(state.status, LoadStatus::Loaded);
        assert!(!state.feed.as_ref().unwrap().games.is_empty());

        let failing = FeedClient::new(vec![], std::time::Duration::from_secs(1));
        dispatch(&mut state, Action::ShiftDate(1), &failing).await;
        assert!(matches!(state.status, LoadStatus::Failed(_)));
        assert_eq!(state.latest_request, 2);
    }
}
