use crate::board::logos::{encode_path_segment, LogoResolver, LogoSource};
use crate::config::Config;
use crate::models::{Game, MarketType, Quote, Side};
use crate::utils::date_filter::filter_by_date;
use crate::utils::normalizer::normalize;
use crate::utils::odds_selector::{select_best, sportsbook_matches, BestOdds};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

pub const NOT_AVAILABLE: &str = "N/A";

/// Inputs to the table besides the games themselves
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub timezone: Tz,
    /// Column order and sportsbook eligibility
    pub sportsbooks: Vec<String>,
    pub logos: LogoResolver,
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timezone: config.timezone,
            sportsbooks: config.sportsbooks.clone(),
            logos: LogoResolver::scan(&config.logo_dir),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnHeader {
    pub sportsbook: String,
    pub logo: LogoSource,
    /// Image to show first
    pub logo_url: String,
    /// Server-side chain that always ends in a generated image
    pub fallback_url: String,
}

/// One sportsbook's price for both sides of the active market
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsCell {
    pub sportsbook: String,
    pub first: String,
    pub second: String,
    pub first_best: bool,
    pub second_best: bool,
}

/// Best price for one side and the book offering it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestCell {
    pub text: String,
    pub sportsbook: String,
}

impl BestCell {
    fn missing() -> Self {
        Self {
            text: NOT_AVAILABLE.to_string(),
            sportsbook: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRow {
    pub game_id: String,
    pub kickoff: String,
    pub status: String,
    pub away_team: String,
    pub home_team: String,
    pub away_short: String,
    pub home_short: String,
    pub best_first: BestCell,
    pub best_second: BestCell,
    pub cells: Vec<OddsCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "row", rename_all = "snake_case")]
pub enum BoardRow {
    Game(GameRow),
    /// Single full-width message row
    Placeholder(String),
}

/// Display model for one date and market
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardTable {
    pub date: NaiveDate,
    pub market: MarketType,
    pub first_label: String,
    pub second_label: String,
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<BoardRow>,
    pub game_count: usize,
}

impl BoardTable {
    pub fn game_rows(&self) -> impl Iterator<Item = &GameRow> {
        self.rows.iter().filter_map(|row| match row {
            BoardRow::Game(game) => Some(game),
            BoardRow::Placeholder(_) => None,
        })
    }
}

/// Build the odds table for `date`.
///
/// Games are filtered to the civil date, deduplicated, sorted by kickoff and
/// priced against the configured sportsbooks. The column set comes from the
/// options alone, so it is the same on days with no games.
pub fn render_table(
    games: &[Game],
    date: NaiveDate,
    market: MarketType,
    options: &RenderOptions,
) -> BoardTable {
    let mut games = normalize(filter_by_date(games, date, options.timezone));
    games.sort_by_key(|game| game.kickoff());

    let columns = options
        .sportsbooks
        .iter()
        .map(|sportsbook| column_header(sportsbook, &options.logos))
        .collect();

    let rows: Vec<BoardRow> = if games.is_empty() {
        vec![BoardRow::Placeholder(format!("No games scheduled for {}", date))]
    } else {
        games
            .iter()
            .map(|game| BoardRow::Game(game_row(game, market, options)))
            .collect()
    };

    let [first_side, second_side] = market.sides();
    BoardTable {
        date,
        market,
        first_label: first_side.label().to_string(),
        second_label: second_side.label().to_string(),
        columns,
        game_count: games.len(),
        rows,
    }
}

fn column_header(sportsbook: &str, logos: &LogoResolver) -> ColumnHeader {
    let logo = logos.resolve(sportsbook);
    let fallback_url = format!("/logos/{}", encode_path_segment(sportsbook));
    ColumnHeader {
        sportsbook: sportsbook.to_string(),
        logo_url: logo.url().unwrap_or_else(|| fallback_url.clone()),
        logo,
        fallback_url,
    }
}

fn game_row(game: &Game, market: MarketType, options: &RenderOptions) -> GameRow {
    let quotes = game.odds.quotes(market);
    let best = select_best(&quotes, market, &options.sportsbooks);
    let [first_side, second_side] = market.sides();

    let cells = options
        .sportsbooks
        .iter()
        .map(|column| {
            let matching: Vec<&dyn Quote> = quotes
                .iter()
                .copied()
                .filter(|quote| sportsbook_matches(quote.sportsbook(), column))
                .collect();
            odds_cell(column, &matching, market, &best)
        })
        .collect();

    let away_team = game.away_team.clone().unwrap_or_else(|| "Unknown".to_string());
    let home_team = game.home_team.clone().unwrap_or_else(|| "Unknown".to_string());

    GameRow {
        game_id: game.game_id.clone(),
        kickoff: game
            .kickoff()
            .map(|kickoff| {
                kickoff
                    .with_timezone(&options.timezone)
                    .format("%-I:%M %p")
                    .to_string()
            })
            .unwrap_or_else(|| "TBD".to_string()),
        status: game.status.clone(),
        away_short: short_name(&away_team),
        home_short: short_name(&home_team),
        away_team,
        home_team,
        best_first: best_cell(&best, first_side),
        best_second: best_cell(&best, second_side),
        cells,
    }
}

fn odds_cell(
    column: &str,
    matching: &[&dyn Quote],
    market: MarketType,
    best: &BestOdds,
) -> OddsCell {
    let [first_side, second_side] = market.sides();
    let side_cell = |side: Side| match column_quote(matching, side, best) {
        Some(quote) => {
            let is_best = best
                .get(side)
                .is_some_and(|best| quote.sportsbook() == best.sportsbook);
            (cell_text(market, side, quote.side(side)), is_best)
        }
        None => (NOT_AVAILABLE.to_string(), false),
    };
    let (first, first_best) = side_cell(first_side);
    let (second, second_best) = side_cell(second_side);

    OddsCell {
        sportsbook: column.to_string(),
        first,
        second,
        first_best,
        second_best,
    }
}

/// Several feed names can fall under one column. A side shows the best quote
/// when it is among them, otherwise the first one with a price.
fn column_quote<'a>(
    matching: &[&'a dyn Quote],
    side: Side,
    best: &BestOdds,
) -> Option<&'a dyn Quote> {
    let priced = || {
        matching
            .iter()
            .copied()
            .filter(move |quote| quote.side(side).is_some())
    };
    best.get(side)
        .and_then(|best| priced().find(|quote| quote.sportsbook() == best.sportsbook))
        .or_else(|| priced().next())
}

fn best_cell(best: &BestOdds, side: Side) -> BestCell {
    match best.get(side) {
        Some(quote) => BestCell {
            text: cell_text(best.market, side, Some((quote.odds, quote.line))),
            sportsbook: quote.sportsbook.clone(),
        },
        None => BestCell::missing(),
    }
}

/// `+150`, `-1.5 (-110)`, `O 8.5 (-110)`, or `N/A`
pub fn cell_text(market: MarketType, side: Side, price: Option<(i32, Option<f64>)>) -> String {
    let Some((odds, line)) = price else {
        return NOT_AVAILABLE.to_string();
    };

    match (market, line) {
        (MarketType::Moneyline, _) => format_odds(odds),
        (MarketType::Spread, Some(spread)) => format!("{:+} ({})", spread, format_odds(odds)),
        (MarketType::Total, Some(total)) => {
            let prefix = if side == Side::Under { "U" } else { "O" };
            format!("{} {} ({})", prefix, total, format_odds(odds))
        }
        (_, None) => format_odds(odds),
    }
}

pub fn format_odds(odds: i32) -> String {
    format!("{:+}", odds)
}

/// "New York Yankees" -> "Yankees"
pub fn short_name(team: &str) -> String {
    team.split_whitespace()
        .last()
        .unwrap_or(team)
        .to_string()
}

impl fmt::Display for BoardTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} odds for {}", self.market.title(), self.date)?;

        let mut header = format!("{:<9} {:<24} {:<20}", "Time", "Matchup", "Best");
        for column in &self.columns {
            header.push_str(&format!(" {:<16}", column.sportsbook));
        }
        writeln!(f, "{}", header)?;
        writeln!(f, "{}", "-".repeat(header.len()))?;

        for row in &self.rows {
            match row {
                BoardRow::Placeholder(message) => writeln!(f, "{}", message)?,
                BoardRow::Game(game) => {
                    let sides = [
                        (&game.away_short, &game.best_first, true),
                        (&game.home_short, &game.best_second, false),
                    ];
                    for (team, best, first) in sides {
                        let time = if first { game.kickoff.as_str() } else { "" };
                        let best_text = if best.sportsbook.is_empty() {
                            best.text.clone()
                        } else {
                            format!("{} {}", best.text, best.sportsbook)
                        };
                        let mut line = format!("{:<9} {:<24} {:<20}", time, team, best_text);
                        for cell in &game.cells {
                            let (text, is_best) = if first {
                                (&cell.first, cell.first_best)
                            } else {
                                (&cell.second, cell.second_best)
                            };
                            let marked = if is_best { format!("{}*", text) } else { text.clone() };
                            line.push_str(&format!(" {:<16}", marked));
                        }
                        writeln!(f, "{}", line.trim_end())?;
                    }
                }
            }
        }
        Ok(())
    }
}
