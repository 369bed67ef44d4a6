use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use mlb_odds_board::config::SOURCE_NAME;
use mlb_odds_board::data::{feed_file_name, load_json, save_feed};
use mlb_odds_board::date_filter::today_in;
use mlb_odds_board::{
    build_feed, load_board, process_snapshot, Config, FeedDocument, FeedInfo, MarketType, Sport,
    UnabatedSnapshot,
};

#[derive(Parser, Debug)]
#[command(name = "cli", about = "Odds feed generator and board viewer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a feed from the upstream API and print it
    Feed {
        #[arg(long, default_value = "mlb")]
        sport: Sport,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
        /// Also save the feed to a timestamped file
        #[arg(long)]
        save: bool,
    },
    /// Process a saved upstream snapshot without calling the API
    Process {
        snapshot: String,
        #[arg(long, default_value = "mlb")]
        sport: Sport,
        /// Write the resulting feed here
        #[arg(long)]
        output: Option<String>,
    },
    /// Print the odds board for one date
    Board {
        #[arg(long, default_value = "mlb")]
        sport: Sport,
        #[arg(long, default_value = "moneyline")]
        market: MarketType,
        /// YYYY-MM-DD, defaults to today in TARGET_TIMEZONE
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Overrides FEED_URL
        #[arg(long)]
        feed_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Feed {
            sport,
            pretty,
            save,
        } => {
            let feed = build_feed(&config, sport).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&feed)?
            } else {
                serde_json::to_string(&feed)?
            };
            println!("{}", json);

            if save {
                let path = feed_file_name(sport, Local::now());
                save_feed(&feed, &path, true)?;
                eprintln!("Saved feed to {}", path);
            }
        }
        Command::Process {
            snapshot,
            sport,
            output,
        } => {
            println!("Processing snapshot {}...\n", snapshot);
            let raw: UnabatedSnapshot = load_json(&snapshot)
                .with_context(|| format!("Failed to load snapshot {}", snapshot))?;
            let feed = snapshot_feed(&raw, sport, &snapshot);

            println!("Processed {} games", feed.games.len());
            for game in &feed.games {
                println!(
                    "\n{} ({}) - {}",
                    game.event_name,
                    game.game_time.as_deref().unwrap_or("TBD"),
                    game.status
                );
                if game.odds.is_empty() {
                    println!("  No odds posted");
                    continue;
                }
                println!(
                    "  {} moneyline, {} spread, {} total quotes",
                    game.odds.moneyline.len(),
                    game.odds.spread.len(),
                    game.odds.total.len()
                );
            }

            if let Some(output) = output {
                save_feed(&feed, &output, true)?;
                println!("\nSaved feed to {}", output);
            }
        }
        Command::Board {
            sport,
            market,
            date,
            feed_url,
        } => {
            if let Some(feed_url) = feed_url {
                config.feed_url = feed_url;
            }
            let date = date.unwrap_or_else(|| today_in(config.timezone));
            let view = load_board(&config, sport, market, date).await;

            println!("{} Odds Board\n", view.sport_title);
            if let Some(notice) = &view.notice {
                eprintln!("{}\n", notice);
            }
            print!("{}", view.table);
            if let Some(generated_at) = &view.generated_at {
                println!("\nFeed generated {}", generated_at);
            }
        }
    }

    Ok(())
}

fn snapshot_feed(snapshot: &UnabatedSnapshot, sport: Sport, path: &str) -> FeedDocument {
    let games = process_snapshot(snapshot, sport);
    if games.is_empty() {
        return FeedDocument::error(
            sport,
            SOURCE_NAME,
            format!("No {} games found in {}", sport.title(), path),
        );
    }

    FeedDocument {
        feed_info: FeedInfo {
            title: format!("{} Odds Feed - {}", sport.title(), SOURCE_NAME),
            description: format!("{} odds processed from snapshot {}", sport.title(), path),
            generated_at: Utc::now().to_rfc3339(),
            source: SOURCE_NAME.to_string(),
            total_games: games.len(),
            available_sportsbooks: Some(
                snapshot
                    .market_sources
                    .iter()
                    .filter(|source| source.is_active)
                    .filter_map(|source| source.name.clone())
                    .collect(),
            ),
            market_types: Some(MarketType::ALL.to_vec()),
            league: Some(format!("{} (League ID: {})", sport.title(), sport.league_id())),
            ..Default::default()
        },
        games,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_board_args() {
        let cli = Cli::try_parse_from([
            "cli", "board", "--sport", "NBA", "--market", "total", "--date", "2025-06-02",
        ])
        .unwrap();
        match cli.command {
            Command::Board {
                sport,
                market,
                date,
                feed_url,
            } => {
                assert_eq!(sport, Sport::Nba);
                assert_eq!(market, MarketType::Total);
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 2));
                assert!(feed_url.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["cli", "board", "--market", "parlay"]).is_err());
    }

    #[test]
    fn test_snapshot_feed_from_mock() {
        let raw: UnabatedSnapshot = load_json("data/mock_snapshot.json").unwrap();
        let feed = snapshot_feed(&raw, Sport::Mlb, "data/mock_snapshot.json");
        assert!(!feed.is_error());
        assert_eq!(feed.feed_info.total_games, 1);
        assert_eq!(feed.games[0].event_name, "New York Yankees at Boston Red Sox");
        assert_eq!(feed.games[0].odds.moneyline.len(), 2);

        let other = snapshot_feed(&raw, Sport::Nhl, "data/mock_snapshot.json");
        assert!(other.is_error());
    }
}
