use crate::models::{parse_timestamp, Game, GameOdds, Quote};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Identity of a real-world event across polling cycles: both teams plus the
/// kickoff floored to the UTC hour
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchupKey {
    pub away_team: String,
    pub home_team: String,
    pub hour: DateTime<Utc>,
}

impl MatchupKey {
    /// `None` when the game is missing a team or a parseable kickoff
    pub fn for_game(game: &Game) -> Option<Self> {
        let away_team = game.away_team.as_deref().filter(|t| !t.trim().is_empty())?;
        let home_team = game.home_team.as_deref().filter(|t| !t.trim().is_empty())?;
        let kickoff = game.kickoff()?;

        let secs = kickoff.timestamp();
        let hour = DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0)?;

        Some(Self {
            away_team: away_team.to_string(),
            home_team: home_team.to_string(),
            hour,
        })
    }
}

/// Fold duplicate observations of the same matchup into one record.
///
/// The first record seen for a key is kept in place and later duplicates are
/// merged into it. Malformed records (no teams or kickoff) are passed
/// through untouched.
pub fn normalize(games: Vec<Game>) -> Vec<Game> {
    let mut normalized: Vec<Game> = Vec::with_capacity(games.len());
    let mut index_by_key: HashMap<MatchupKey, usize> = HashMap::new();
    let mut malformed = 0usize;
    let mut merged = 0usize;

    for game in games {
        let Some(key) = MatchupKey::for_game(&game) else {
            malformed += 1;
            warn!(
                "Skipping dedup for malformed game {:?} (missing team or game_time)",
                game.game_id
            );
            normalized.push(game);
            continue;
        };

        match index_by_key.get(&key) {
            Some(&index) => {
                merge_odds(&mut normalized[index], &game);
                merged += 1;
            }
            None => {
                index_by_key.insert(key, normalized.len());
                normalized.push(game);
            }
        }
    }

    if merged > 0 || malformed > 0 {
        debug!(
            "Normalized feed: {} games kept, {} duplicates merged, {} malformed",
            normalized.len(),
            merged,
            malformed
        );
    }

    normalized
}

/// Merge `source`'s quotes into `target`. A sportsbook's quote is added when
/// `target` has none for that market and replaced only when `source` was
/// updated strictly later.
pub fn merge_odds(target: &mut Game, source: &Game) {
    let GameOdds {
        spread,
        moneyline,
        total,
    } = &source.odds;

    merge_quotes(&mut target.odds.spread, spread);
    merge_quotes(&mut target.odds.moneyline, moneyline);
    merge_quotes(&mut target.odds.total, total);
}

fn merge_quotes<Q: Quote + Clone>(target: &mut Vec<Q>, source: &[Q]) {
    for quote in source {
        match target
            .iter_mut()
            .find(|existing| existing.sportsbook() == quote.sportsbook())
        {
            Some(existing) => {
                if is_newer(quote.last_updated(), existing.last_updated()) {
                    *existing = quote.clone();
                }
            }
            None => target.push(quote.clone()),
        }
    }
}

/// Strictly later, with anything missing or unparseable counting as not newer
fn is_newer(candidate: Option<&str>, existing: Option<&str>) -> bool {
    match (
        candidate.and_then(parse_timestamp),
        existing.and_then(parse_timestamp),
    ) {
        (Some(candidate), Some(existing)) => candidate > existing,
        _ => false,
    }
}
