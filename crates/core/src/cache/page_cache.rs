use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::text::{NormalizedContent, normalize};

/// A page served from the cache or freshly fetched into it.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub content: Arc<NormalizedContent>,
    pub from_cache: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheEntry {
    content: Arc<NormalizedContent>,
    fetched_at: DateTime<Utc>,
    stored_at: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

/// TTL-bounded, size-bounded cache of normalized pages.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Debug, Clone)]
pub struct PageCache {
    state: Arc<RwLock<CacheState>>,
    ttl: Duration,
    max_size: usize,
}

impl PageCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self { state: Arc::new(RwLock::new(CacheState::default())), ttl, max_size: max_size.max(1) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Drop a single entry. Returns whether one was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.state.write().await.entries.remove(key).is_some()
    }

    /// Return the cached page for `key`, fetching and normalizing it on a miss.
    ///
    /// `fetch` receives the key and must return the raw page text. Its error
    /// is returned unchanged and nothing is inserted. No lock is held while
    /// `fetch` runs, so concurrent misses on one key each fetch and the last
    /// insert wins.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<CachedPage, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(page) = self.lookup(key).await {
            return Ok(page);
        }

        tracing::debug!(key, "page cache miss");
        let raw = fetch(key.to_string()).await?;
        let content = Arc::new(normalize(&raw));
        let fetched_at = Utc::now();

        self.insert(key, Arc::clone(&content), fetched_at).await;

        Ok(CachedPage { content, from_cache: false, fetched_at })
    }

    async fn lookup(&self, key: &str) -> Option<CachedPage> {
        {
            let state = self.state.read().await;
            match state.entries.get(key) {
                None => return None,
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    tracing::debug!(key, "page cache hit");
                    return Some(CachedPage {
                        content: Arc::clone(&entry.content),
                        from_cache: true,
                        fetched_at: entry.fetched_at,
                    });
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().await;
        // Re-check under the write lock; another task may have refreshed it.
        let stale = state.entries.get(key).is_some_and(|entry| entry.stored_at.elapsed() >= self.ttl);
        if stale {
            state.entries.remove(key);
            tracing::debug!(key, "page cache entry expired");
            return None;
        }

        state.entries.get(key).map(|entry| CachedPage {
            content: Arc::clone(&entry.content),
            from_cache: true,
            fetched_at: entry.fetched_at,
        })
    }

    async fn insert(&self, key: &str, content: Arc<NormalizedContent>, fetched_at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;

        state
            .entries
            .insert(key.to_string(), CacheEntry { content, fetched_at, stored_at: Instant::now(), seq });

        while state.entries.len() > self.max_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.stored_at, entry.seq))
                .map(|(k, _)| k.clone());

            let Some(oldest) = oldest else { break };
            state.entries.remove(&oldest);
            tracing::debug!(key = %oldest, max_size = self.max_size, "page cache evicted oldest entry");
        }
    }

    /// Delete every entry whose age has reached the TTL.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        before - state.entries.len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until the
    /// returned task is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired().await;
                if removed > 0 {
                    let remaining = cache.len().await;
                    tracing::debug!(removed, remaining, "page cache sweep");
                }
            }
        })
    }
}
