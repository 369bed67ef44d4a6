use crate::models::Game;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

/// Civil date of a game's kickoff in `timezone`
pub fn civil_date(game: &Game, timezone: Tz) -> Option<NaiveDate> {
    game.kickoff()
        .map(|kickoff| kickoff.with_timezone(&timezone).date_naive())
}

/// Keep the games whose kickoff falls on `target_date` as seen in `timezone`.
/// Games without a parseable kickoff never match.
pub fn filter_by_date(games: &[Game], target_date: NaiveDate, timezone: Tz) -> Vec<Game> {
    games
        .iter()
        .filter(|game| civil_date(game, timezone) == Some(target_date))
        .cloned()
        .collect()
}

/// Today's date in `timezone`
pub fn today_in(timezone: Tz) -> NaiveDate {
    Utc::now().with_timezone(&timezone).date_naive()
}
