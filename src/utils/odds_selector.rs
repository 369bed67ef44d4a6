use crate::models::{MarketType, Quote, Side};
use serde::{Deserialize, Serialize};

/// The best price found for one side of a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestQuote {
    pub odds: i32,
    pub sportsbook: String,
    /// Spread or total line, when the market has one
    pub line: Option<f64>,
}

/// Best prices for both sides of one market. `first` is away (or over),
/// `second` is home (or under).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestOdds {
    pub market: MarketType,
    pub first: Option<BestQuote>,
    pub second: Option<BestQuote>,
}

impl BestOdds {
    pub fn get(&self, side: Side) -> Option<&BestQuote> {
        let [first, _] = self.market.sides();
        if side == first {
            self.first.as_ref()
        } else {
            self.second.as_ref()
        }
    }
}

/// Lower-case and strip everything that is not a letter or digit
/// "Caesars Sportsbook" -> "caesarssportsbook"
pub fn normalize_sportsbook_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Loose sportsbook name match: equal after normalizing, or one contains the other
pub fn sportsbook_matches(source: &str, allowed: &str) -> bool {
    let source = normalize_sportsbook_name(source);
    let allowed = normalize_sportsbook_name(allowed);

    if source.is_empty() || allowed.is_empty() {
        return false;
    }

    source == allowed || source.contains(&allowed) || allowed.contains(&source)
}

pub fn is_allowed_sportsbook<S: AsRef<str>>(name: &str, allowed: &[S]) -> bool {
    allowed
        .iter()
        .any(|allowed| sportsbook_matches(name, allowed.as_ref()))
}

/// Price comparison used for every market.
///
/// With `is_positive` the larger price wins; otherwise the price closest to
/// zero (cheapest) wins. Equal prices never replace the current best.
pub fn is_better_odds(candidate: i32, current: Option<i32>, is_positive: bool) -> bool {
    match current {
        None => true,
        Some(current) if is_positive => candidate > current,
        Some(current) => candidate.unsigned_abs() < current.unsigned_abs(),
    }
}

/// Moneyline rule: only a positive candidate can displace an existing best,
/// and only by being strictly greater. Negative candidates never replace a
/// best once one is set, even a cheaper favorite price.
fn is_better_moneyline(candidate: i32, current: Option<i32>) -> bool {
    current.is_none() || (candidate > 0 && is_better_odds(candidate, current, true))
}

/// Pick the best quote per side among the allowed sportsbooks
pub fn select_best<S: AsRef<str>>(
    quotes: &[&dyn Quote],
    market: MarketType,
    allowed_sportsbooks: &[S],
) -> BestOdds {
    let [first_side, second_side] = market.sides();
    let eligible: Vec<&dyn Quote> = quotes
        .iter()
        .copied()
        .filter(|quote| is_allowed_sportsbook(quote.sportsbook(), allowed_sportsbooks))
        .collect();

    BestOdds {
        market,
        first: best_for_side(&eligible, market, first_side),
        second: best_for_side(&eligible, market, second_side),
    }
}

fn best_for_side(quotes: &[&dyn Quote], market: MarketType, side: Side) -> Option<BestQuote> {
    let mut best: Option<BestQuote> = None;

    for quote in quotes {
        let Some((odds, line)) = quote.side(side) else {
            continue;
        };

        let current = best.as_ref().map(|b| b.odds);
        let better = match market {
            MarketType::Moneyline => is_better_moneyline(odds, current),
            MarketType::Spread | MarketType::Total => is_better_odds(odds, current, false),
        };

        if better {
            best = Some(BestQuote {
                odds,
                sportsbook: quote.sportsbook().to_string(),
                line,
            });
        }
    }

    best
}
