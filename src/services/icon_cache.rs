//! In-memory icon cache
//!
//! LRU-bounded map from target to downloaded icon payload. Entries expire a
//! fixed TTL after insertion; expired entries are dropped lazily on lookup
//! and in bulk by the background sweeper.

use bytes::Bytes;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::CacheConfig;
use crate::models::Target;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Bytes,
    pub content_type: String,
    pub inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
}

pub struct IconCache {
    entries: Mutex<LruCache<Target, CacheEntry>>,
    ttl: Duration,
    max_entry_size: usize,
}

impl IconCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_entries, config.ttl, config.max_entry_size)
    }

    pub fn with_limits(max_entries: usize, ttl: Duration, max_entry_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            max_entry_size,
        }
    }

    /// Largest payload `put` will accept
    pub fn max_entry_size(&self) -> usize {
        self.max_entry_size
    }

    /// Fresh entry for `target`, if any. Expired entries are removed here.
    pub async fn get(&self, target: &Target) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().await;
        let expired = entries
            .peek(target)
            .map(|entry| entry.is_expired(Instant::now(), self.ttl))?;

        if expired {
            entries.pop(target);
            trace!(target = %target, "Dropped expired cache entry");
            return None;
        }
        entries.get(target).cloned()
    }

    /// Store a payload, replacing any previous entry and restarting its TTL.
    /// Returns false when the payload is too large to cache.
    pub async fn put(&self, target: Target, payload: Bytes, content_type: String) -> bool {
        if payload.len() > self.max_entry_size {
            debug!(
                target = %target,
                size = payload.len(),
                max_entry_size = self.max_entry_size,
                "Icon too large to cache"
            );
            return false;
        }

        let entry = CacheEntry {
            payload,
            content_type,
            inserted_at: Instant::now(),
        };
        self.entries.lock().await.put(target, entry);
        true
    }

    /// Remove every expired entry, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expired: Vec<Target> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.ttl))
            .map(|(target, _)| target.clone())
            .collect();

        for target in &expired {
            entries.pop(target);
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }

    /// Periodically purge expired entries until `shutdown` is cancelled.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!("Starting icon cache sweeper with interval: {:?}", period);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Icon cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = self.purge_expired().await;
                        if purged > 0 {
                            info!(purged, "Purged expired icon cache entries");
                        } else {
                            trace!("Icon cache sweep found nothing to purge");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(12 * 60 * 60);

    fn target(raw: &str) -> Target {
        Target::normalize(raw).unwrap()
    }

    fn cache() -> IconCache {
        IconCache::with_limits(100, TTL, 1024)
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_then_get() {
        let cache = cache();
        cache
            .put(target("a.com"), Bytes::from_static(b"icon"), "image/png".into())
            .await;

        let entry = cache.get(&target("http://a.com/x")).await.unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"icon"));
        assert_eq!(entry.content_type, "image/png");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = cache();
        cache
            .put(target("a.com"), Bytes::from_static(b"icon"), "image/png".into())
            .await;

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(cache.get(&target("a.com")).await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&target("a.com")).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_ttl() {
        let cache = cache();
        cache
            .put(target("a.com"), Bytes::from_static(b"old"), "image/png".into())
            .await;
        tokio::time::advance(Duration::from_secs(10 * 60 * 60)).await;
        cache
            .put(target("a.com"), Bytes::from_static(b"new"), "image/x-icon".into())
            .await;
        tokio::time::advance(Duration::from_secs(5 * 60 * 60)).await;

        let entry = cache.get(&target("a.com")).await.unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"new"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_targets_do_not_collide() {
        let cache = cache();
        cache
            .put(target("a.com"), Bytes::from_static(b"a"), "image/png".into())
            .await;
        cache
            .put(target("b.com"), Bytes::from_static(b"b"), "image/png".into())
            .await;

        assert_eq!(cache.get(&target("a.com")).await.unwrap().payload, "a");
        assert_eq!(cache.get(&target("b.com")).await.unwrap().payload, "b");
        assert!(cache.get(&target("c.com")).await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_payload_is_not_cached() {
        let cache = IconCache::with_limits(10, TTL, 4);
        let stored = cache
            .put(target("a.com"), Bytes::from_static(b"too large"), "image/png".into())
            .await;
        assert!(!stored);
        assert!(cache.get(&target("a.com")).await.is_none());
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let cache = IconCache::with_limits(2, TTL, 1024);
        cache.put(target("a.com"), Bytes::from_static(b"a"), "image/png".into()).await;
        cache.put(target("b.com"), Bytes::from_static(b"b"), "image/png".into()).await;
        assert!(cache.get(&target("a.com")).await.is_some());

        cache.put(target("c.com"), Bytes::from_static(b"c"), "image/png".into()).await;
        assert!(cache.get(&target("b.com")).await.is_none());
        assert!(cache.get(&target("a.com")).await.is_some());
        assert_eq!(cache.stats().await.capacity, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_counts_entries() {
        let cache = cache();
        cache.put(target("a.com"), Bytes::from_static(b"a"), "image/png".into()).await;
        cache.put(target("b.com"), Bytes::from_static(b"b"), "image/png".into()).await;
        tokio::time::advance(Duration::from_secs(6 * 60 * 60)).await;
        cache.put(target("c.com"), Bytes::from_static(b"c"), "image/png".into()).await;
        tokio::time::advance(Duration::from_secs(6 * 60 * 60)).await;

        assert_eq!(cache.purge_expired().await, 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_in_background() {
        let cache = Arc::new(IconCache::with_limits(10, Duration::from_secs(30 * 60), 1024));
        cache.put(target("a.com"), Bytes::from_static(b"a"), "image/png".into()).await;

        let shutdown = CancellationToken::new();
        let handle = cache
            .clone()
            .spawn_sweeper(Duration::from_secs(60 * 60), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(61 * 60)).await;
        assert_eq!(cache.stats().await.entries, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
