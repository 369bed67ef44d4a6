use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use mlb_odds_board::board::logos::{content_type_for, placeholder_svg};
use mlb_odds_board::utils::date_filter::today_in;
use mlb_odds_board::utils::feed_cache::{get_or_refresh, FeedCache};
use mlb_odds_board::{
    dispatch, render, Action, AppState, BoardRow, BoardView, Config, FeedClient, FeedDocument,
    MarketType, RenderOptions, Sport, UnabatedApiClient,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

// Custom filters for formatting
mod filters {
    use chrono::DateTime;

    pub fn timestamp(s: &str) -> ::askama::Result<String> {
        Ok(match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.format("%b %-d, %Y %-I:%M %p %Z").to_string(),
            Err(_) => s.to_string(),
        })
    }
}

#[derive(Template)]
#[template(path = "board.html")]
struct BoardTemplate {
    view: BoardView,
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// JSON error body shared by every endpoint
enum AppError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, "Bad request", message),
            AppError::Internal(e) => {
                error!("Internal server error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    e.to_string(),
                )
            }
        };
        let body = json!({
            "error": error,
            "message": message,
            "timestamp": Local::now().to_rfc3339(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

struct AppContext {
    config: Config,
    cache: RwLock<FeedCache>,
    upstream: Option<UnabatedApiClient>,
    feed_client: FeedClient,
    render_options: RenderOptions,
}

// Shared state: config plus the feed cache
type SharedData = Arc<AppContext>;

impl AppContext {
    fn new(config: Config, upstream: Option<UnabatedApiClient>) -> Self {
        Self {
            cache: RwLock::new(FeedCache::new(config.cache_duration)),
            feed_client: FeedClient::from_config(&config),
            render_options: RenderOptions::from_config(&config),
            upstream,
            config,
        }
    }

    async fn feed(&self, sport: Sport) -> FeedDocument {
        get_or_refresh(&self.cache, sport, || async {
            match &self.upstream {
                Some(client) => client.generate_feed(sport).await.map_err(|e| e.to_string()),
                None => Err("UNABATED_API_KEY is not set".to_string()),
            }
        })
        .await
    }
}

fn parse_sport(raw: Option<&str>) -> Result<Sport, AppError> {
    raw.map(str::parse::<Sport>)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(AppError::BadRequest)
}

#[derive(Debug, Deserialize)]
struct SportQuery {
    sport: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    sport: Option<String>,
    pretty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoardQuery {
    sport: Option<String>,
    market: Option<String>,
    date: Option<String>,
    shift: Option<i64>,
}

async fn board(
    State(data): State<SharedData>,
    Query(query): Query<BoardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sport = parse_sport(query.sport.as_deref())?;
    let market = query
        .market
        .as_deref()
        .map(str::parse::<MarketType>)
        .transpose()
        .map_err(AppError::BadRequest)?
        .unwrap_or_default();
    let date = match query.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(format!("invalid date: {}", raw)))?,
        None => today_in(data.config.timezone),
    };

    let mut state = AppState::new(sport, market, date);
    let action = match query.shift {
        Some(days) if days != 0 => Action::ShiftDate(days),
        _ => Action::Refresh,
    };
    dispatch(&mut state, action, &data.feed_client).await;

    let template = BoardTemplate {
        view: render(&state, &data.render_options),
    };
    Ok(HtmlTemplate(template))
}

async fn feed(
    State(data): State<SharedData>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let sport = parse_sport(query.sport.as_deref())?;
    let feed = data.feed(sport).await;

    let pretty = query
        .pretty
        .map(|p| matches!(p.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);
    let body = if pretty {
        serde_json::to_string_pretty(&feed)
    } else {
        serde_json::to_string(&feed)
    }
    .map_err(anyhow::Error::from)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_str(&format!(
            "public, max-age={}",
            data.cache.read().await.ttl().as_secs()
        ))
        .map_err(anyhow::Error::from)?,
    );
    headers.insert("x-total-games", HeaderValue::from(feed.feed_info.total_games));

    Ok((headers, body).into_response())
}

async fn status(
    State(data): State<SharedData>,
    Query(query): Query<SportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sport = parse_sport(query.sport.as_deref())?;
    let cache = data.cache.read().await.status(sport, chrono::Utc::now());

    Ok(Json(json!({
        "status": "operational",
        "timestamp": Local::now().to_rfc3339(),
        "sport": sport,
        "cache": cache,
        "api": {
            "source": mlb_odds_board::config::SOURCE_NAME,
            "endpoint": format!(
                "{}{}",
                data.config.base_url,
                mlb_odds_board::config::GAME_ODDS_ENDPOINT
            ),
            "configured": data.upstream.is_some(),
        }
    })))
}

async fn games_count(
    State(data): State<SharedData>,
    Query(query): Query<SportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sport = parse_sport(query.sport.as_deref())?;
    let feed = data.feed(sport).await;

    Ok(Json(json!({
        "total_games": feed.feed_info.total_games,
        "sport": sport,
        "timestamp": Local::now().to_rfc3339(),
        "source": mlb_odds_board::config::SOURCE_NAME,
    })))
}

async fn logo(
    State(data): State<SharedData>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    if let Some(path) = data.render_options.logos.find_file(&name) {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        return Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes).into_response());
    }

    Ok((
        [(header::CONTENT_TYPE, "image/svg+xml")],
        placeholder_svg(&name),
    )
        .into_response())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "message": "The requested endpoint does not exist",
            "available_endpoints": ["/", "/feed", "/status", "/games/count", "/logos/{name}"],
            "timestamp": Local::now().to_rfc3339(),
        })),
    )
}

fn app(data: SharedData) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // This will serve files from the "static" directory at the "/static" URL path
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(board))
        .route("/feed", get(feed))
        .route("/status", get(status))
        .route("/games/count", get(games_count))
        .route("/logos/:name", get(logo))
        .fallback(not_found)
        .layer(cors)
        .with_state(data)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    let upstream = match UnabatedApiClient::from_config(&config) {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Warning: {}", e);
            eprintln!("Server will start but /feed will report errors");
            None
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    println!("Starting MLB odds board at http://{}", addr);
    println!("  - Board:  http://{}/", addr);
    println!("  - Feed:   http://{}/feed", addr);
    println!("  - Status: http://{}/status", addr);
    println!("Press Ctrl+C to stop\n");

    let data = Arc::new(AppContext::new(config, upstream));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app(data)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use mlb_odds_board::FeedSource;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            // Nothing listens here, so the board falls back to the sample file
            feed_url: "http://127.0.0.1:9/feed".to_string(),
            feed_timeout: Duration::from_secs(2),
            ..Config::default()
        }
    }

    fn test_app(upstream: Option<UnabatedApiClient>) -> Router {
        app(Arc::new(AppContext::new(test_config(), upstream)))
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, HeaderMap, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_feed_without_api_key_returns_error_feed() {
        let (status, headers, body) = get_body(test_app(None), "/feed?pretty=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-total-games"], "0");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");

        let feed: FeedDocument = serde_json::from_str(&body).unwrap();
        assert!(feed.is_error());
        assert!(body.contains("\n  \"feed_info\""));
    }

    #[tokio::test]
    async fn test_feed_rejects_unknown_sport() {
        let (status, _, body) = get_body(test_app(None), "/feed?sport=cricket").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("unknown sport"));
    }

    #[tokio::test]
    async fn test_status_reports_empty_cache() {
        let (status, _, body) = get_body(test_app(None), "/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "operational");
        assert_eq!(json["cache"]["has_data"], false);
        assert_eq!(json["cache"]["cache_duration_minutes"], 5);
        assert_eq!(json["api"]["configured"], false);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (status, _, body) = get_body(test_app(None), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Not found");
        assert!(json["available_endpoints"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_logo_falls_back_to_svg() {
        let (status, headers, body) = get_body(test_app(None), "/logos/Some%20Book").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/svg+xml");
        assert!(body.contains(">S</text>"));
    }

    #[tokio::test]
    async fn test_board_renders_sample_games() {
        let (status, _, body) = get_body(
            test_app(None),
            "/?sport=mlb&market=moneyline&date=2025-06-02",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Yankees"));
        assert!(body.contains("7:10 PM"));
        assert!(!body.contains("No games scheduled"));
    }

    #[tokio::test]
    async fn test_board_empty_date_and_shift() {
        let (status, _, body) = get_body(
            test_app(None),
            "/?date=2025-06-01&shift=-30&market=total",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No games scheduled for 2025-05-02"));

        let (status, _, _) = get_body(test_app(None), "/?date=June").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_games_count_uses_upstream() {
        let upstream = UnabatedApiClient::new("test-key".to_string())
            .with_base_url("http://127.0.0.1:9")
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(1));
        let (status, _, body) = get_body(test_app(Some(upstream)), "/games/count?sport=nba").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total_games"], 0);
        assert_eq!(json["sport"], "nba");
    }

    #[test]
    fn test_feed_client_sources_follow_config() {
        let context = AppContext::new(test_config(), None);
        assert_eq!(
            context.feed_client.sources()[0],
            FeedSource::Remote("http://127.0.0.1:9/feed".to_string())
        );
    }

    #[test]
    fn test_timestamp_filter() {
        assert_eq!(
            filters::timestamp("2025-06-02T23:10:00+00:00").unwrap(),
            "Jun 2, 2025 11:10 PM +00:00"
        );
        assert_eq!(filters::timestamp("soon").unwrap(), "soon");
    }
}
