use crate::models::{FeedDocument, Sport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CachedFeed {
    pub feed: FeedDocument,
    pub fetched_at: DateTime<Utc>,
}

/// Cache state reported by `/status`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStatus {
    pub has_data: bool,
    pub last_updated: Option<String>,
    pub age_seconds: i64,
    pub cache_duration_minutes: u64,
    pub is_expired: bool,
}

/// Short-lived per-sport feed cache
#[derive(Debug)]
pub struct FeedCache {
    ttl: Duration,
    entries: HashMap<Sport, CachedFeed>,
    refreshing: HashMap<Sport, Arc<Mutex<()>>>,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            refreshing: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn age(entry: &CachedFeed, now: DateTime<Utc>) -> chrono::Duration {
        now - entry.fetched_at
    }

    fn is_fresh(&self, entry: &CachedFeed, now: DateTime<Utc>) -> bool {
        Self::age(entry, now).num_milliseconds() < self.ttl.as_millis() as i64
    }

    /// Cached feed if it is younger than the TTL
    pub fn fresh(&self, sport: Sport, now: DateTime<Utc>) -> Option<&FeedDocument> {
        self.entries
            .get(&sport)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| &entry.feed)
    }

    /// Cached feed regardless of age
    pub fn any(&self, sport: Sport) -> Option<&FeedDocument> {
        self.entries.get(&sport).map(|entry| &entry.feed)
    }

    pub fn store(&mut self, sport: Sport, feed: FeedDocument, now: DateTime<Utc>) {
        self.entries.insert(
            sport,
            CachedFeed {
                feed,
                fetched_at: now,
            },
        );
    }

    /// Held for the duration of one sport's upstream refresh
    fn refresh_lock(&mut self, sport: Sport) -> Arc<Mutex<()>> {
        self.refreshing.entry(sport).or_default().clone()
    }

    pub fn status(&self, sport: Sport, now: DateTime<Utc>) -> CacheStatus {
        let entry = self.entries.get(&sport);
        let age_seconds = entry
            .map(|entry| Self::age(entry, now).num_seconds())
            .unwrap_or(0);

        CacheStatus {
            has_data: entry.is_some(),
            last_updated: entry.map(|entry| entry.fetched_at.to_rfc3339()),
            age_seconds,
            cache_duration_minutes: self.ttl.as_secs() / 60,
            is_expired: entry.map(|entry| !self.is_fresh(entry, now)).unwrap_or(false),
        }
    }
}

/// Return the cached feed for `sport`, refreshing it through `refresh` when
/// it has expired. A failed refresh serves the stale copy when there is one
/// and an error feed otherwise. Concurrent callers for the same sport share
/// one refresh.
pub async fn get_or_refresh<F, Fut, E>(
    cache: &RwLock<FeedCache>,
    sport: Sport,
    refresh: F,
) -> FeedDocument
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<FeedDocument, E>>,
    E: std::fmt::Display,
{
    if let Some(feed) = cache.read().await.fresh(sport, Utc::now()) {
        info!("Returning cached {} feed data", sport);
        return feed.clone();
    }

    let lock = cache.write().await.refresh_lock(sport);
    let _refreshing = lock.lock().await;

    // Another caller may have refreshed while this one waited
    if let Some(feed) = cache.read().await.fresh(sport, Utc::now()) {
        info!("Returning cached {} feed data", sport);
        return feed.clone();
    }

    info!("Fetching fresh {} feed data", sport);
    match refresh().await {
        Ok(feed) => {
            info!(
                "Cached {} feed with {} games",
                sport, feed.feed_info.total_games
            );
            cache.write().await.store(sport, feed.clone(), Utc::now());
            feed
        }
        Err(e) => {
            warn!("Error fetching {} feed data: {}", sport, e);
            if let Some(stale) = cache.read().await.any(sport) {
                warn!("Returning expired cached {} data due to API error", sport);
                return stale.clone();
            }
            FeedDocument::error(sport, crate::config::SOURCE_NAME, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn feed(total: usize) -> FeedDocument {
        FeedDocument {
            feed_info: FeedInfo {
                total_games: total,
                ..Default::default()
            },
            games: vec![],
        }
    }

    #[test]
    fn test_fresh_and_expiry() {
        let mut cache = FeedCache::new(Duration::from_secs(300));
        let t0 = Utc::now();
        assert!(cache.fresh(Sport::Mlb, t0).is_none());

        cache.store(Sport::Mlb, feed(3), t0);
        assert!(cache.fresh(Sport::Mlb, t0 + chrono::Duration::seconds(299)).is_some());
        assert!(cache.fresh(Sport::Mlb, t0 + chrono::Duration::seconds(300)).is_none());
        assert!(cache.any(Sport::Mlb).is_some());
        assert!(cache.any(Sport::Nba).is_none());
    }

    #[test]
    fn test_status() {
        let mut cache = FeedCache::new(Duration::from_secs(300));
        let t0 = Utc::now();
        let empty = cache.status(Sport::Mlb, t0);
        assert!(!empty.has_data);
        assert!(!empty.is_expired);
        assert_eq!(empty.cache_duration_minutes, 5);

        cache.store(Sport::Mlb, feed(1), t0);
        let status = cache.status(Sport::Mlb, t0 + chrono::Duration::seconds(400));
        assert!(status.has_data);
        assert!(status.is_expired);
        assert_eq!(status.age_seconds, 400);
    }

    #[tokio::test]
    async fn test_get_or_refresh_uses_cache() {
        let cache = RwLock::new(FeedCache::new(Duration::from_secs(300)));

        let first = get_or_refresh(&cache, Sport::Mlb, || async {
            Ok::<_, String>(feed(2))
        })
        .await;
        assert_eq!(first.feed_info.total_games, 2);

        // Fresh entry, so the refresh closure is not consulted
        let second = get_or_refresh(&cache, Sport::Mlb, || async {
            Ok::<_, String>(feed(9))
        })
        .await;
        assert_eq!(second.feed_info.total_games, 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let cache = RwLock::new(FeedCache::new(Duration::from_secs(300)));
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let refresh = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, String>(feed(6))
        };

        let (a, b) = tokio::join!(
            get_or_refresh(&cache, Sport::Mlb, refresh),
            get_or_refresh(&cache, Sport::Mlb, refresh),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.feed_info.total_games, 6);
        assert_eq!(b.feed_info.total_games, 6);

        // Other sports are refreshed independently
        get_or_refresh(&cache, Sport::Nba, refresh).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_or_refresh_serves_stale_on_error() {
        let cache = RwLock::new(FeedCache::new(Duration::from_secs(0)));
        cache.write().await.store(Sport::Mlb, feed(4), Utc::now());

        let served = get_or_refresh(&cache, Sport::Mlb, || async {
            Err::<FeedDocument, _>("upstream down".to_string())
        })
        .await;
        assert_eq!(served.feed_info.total_games, 4);
        assert!(!served.is_error());
    }

    #[tokio::test]
    async fn test_get_or_refresh_error_feed_without_cache() {
        let cache = RwLock::new(FeedCache::new(Duration::from_secs(300)));
        let served = get_or_refresh(&cache, Sport::Nba, || async {
            Err::<FeedDocument, _>("upstream down".to_string())
        })
        .await;
        assert!(served.is_error());
        assert_eq!(served.feed_info.error.as_deref(), Some("upstream down"));
        assert!(cache.read().await.any(Sport::Nba).is_none());
    }
}
