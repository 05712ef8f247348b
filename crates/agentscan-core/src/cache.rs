//! Pagination cache for merged agent listings.
//!
//! [`CacheStore`] is the in-process TTL store. [`PaginationCache`] layers the
//! JSON-encoded [`CachedPaginationSet`] on top of any [`CacheBackend`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::interleave::dedupe_by_identity;
use crate::{AgentSummary, UtcDateTime};

/// How a single listing request interacts with the pagination cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Serve a live entry when present; otherwise fetch and store. (Default)
    #[default]
    Use,
    /// Skip the read, fetch, and overwrite the entry.
    Refresh,
    /// Fetch without reading or writing the cache.
    Bypass,
}

impl CacheMode {
    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        !matches!(self, Self::Bypass)
    }
}

pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte-oriented key/value store with per-entry TTL.
///
/// Backends are best-effort: a failed write is the backend's problem to log,
/// never the caller's.
pub trait CacheBackend: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>>;
    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()>;
    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Vec<u8>,
    expires_at: Instant,
}

/// Writes between sweeps of expired entries.
const SWEEP_EVERY: u32 = 64;

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    default_ttl: Duration,
    writes_since_sweep: u32,
}

impl CacheInner {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map
            .get(key)
            .filter(|entry| Instant::now() <= entry.expires_at)
            .map(|entry| entry.body.clone())
    }

    fn put(&mut self, key: String, body: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        self.writes_since_sweep += 1;
        if self.writes_since_sweep >= SWEEP_EVERY {
            self.sweep(now);
        }
        self.map.insert(key, CacheEntry { body, expires_at: now + ttl });
    }

    fn sweep(&mut self, now: Instant) {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.expires_at > now);
        self.writes_since_sweep = 0;
        let evicted = before - self.map.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.map.len(), "evicted expired cache entries");
        }
    }
}

/// Thread-safe in-memory TTL store.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                default_ttl,
                writes_since_sweep: 0,
            })),
        }
    }

    /// A store that never keeps anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.read().await.get(key)
    }

    /// Stores `body` for `ttl`, or the default TTL when `ttl` is zero.
    /// A disabled store ignores writes. Every few writes also evict the
    /// entries that have expired.
    pub async fn put_bytes(&self, key: String, body: Vec<u8>, ttl: Duration) {
        let mut store = self.inner.write().await;
        if store.default_ttl == Duration::ZERO {
            return;
        }
        let ttl = if ttl.is_zero() { store.default_ttl } else { ttl };
        store.put(key, body, ttl);
    }

    pub async fn remove_key(&self, key: &str) {
        self.inner.write().await.map.remove(key);
    }

    pub async fn clear_expired(&self) {
        self.inner.write().await.sweep(Instant::now());
    }

    /// Number of entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_disabled(&self) -> bool {
        self.inner.read().await.default_ttl == Duration::ZERO
    }
}

impl CacheBackend for CacheStore {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
        Box::pin(self.get_bytes(key))
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()> {
        Box::pin(self.put_bytes(key.to_owned(), value, ttl))
    }

    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(self.remove_key(key))
    }
}

/// Merged, deduplicated listing for one filter fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPaginationSet {
    pub items: Vec<AgentSummary>,
    pub total: usize,
    pub filter_hash: String,
    pub cached_at: UtcDateTime,
    /// Lifetime the entry was written with. Entries without one live for the
    /// reading cache's default TTL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

impl CachedPaginationSet {
    /// Drops duplicate identities and stamps the set with the current time.
    pub fn new(items: Vec<AgentSummary>, filter_hash: impl Into<String>) -> Self {
        let items = dedupe_by_identity(items);
        Self {
            total: items.len(),
            items,
            filter_hash: filter_hash.into(),
            cached_at: UtcDateTime::now(),
            ttl_ms: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Own TTL when the entry carries one, `default_ttl` otherwise.
    pub fn ttl(&self, default_ttl: Duration) -> Duration {
        self.ttl_ms.map_or(default_ttl, Duration::from_millis)
    }

    pub fn is_expired(&self, default_ttl: Duration) -> bool {
        self.cached_at.is_older_than(self.ttl(default_ttl))
    }
}

/// Typed pagination cache over a [`CacheBackend`].
#[derive(Clone)]
pub struct PaginationCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl std::fmt::Debug for PaginationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl PaginationCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// In-process cache with `ttl`.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(CacheStore::new(ttl)), ttl)
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the live entry for `key`. Absent, expired and undecodable
    /// entries are all misses.
    pub async fn get(&self, key: &str) -> Option<CachedPaginationSet> {
        let bytes = self.backend.get(key).await?;
        let set = match serde_json::from_slice::<CachedPaginationSet>(&bytes) {
            Ok(set) => set,
            Err(error) => {
                warn!(key, error = %error, "discarding undecodable pagination cache entry");
                return None;
            }
        };
        if set.is_expired(self.ttl) {
            debug!(key, cached_at = %set.cached_at, "pagination cache entry expired");
            return None;
        }
        Some(set)
    }

    /// Overwrites the entry for `key`, live for `ttl` or the cache default.
    /// Encoding failures are logged and dropped.
    pub async fn set(
        &self,
        key: &str,
        items: Vec<AgentSummary>,
        filter_hash: &str,
        ttl: Option<Duration>,
    ) -> CachedPaginationSet {
        let ttl = ttl.unwrap_or(self.ttl);
        let set = CachedPaginationSet::new(items, filter_hash).with_ttl(ttl);
        match serde_json::to_vec(&set) {
            Ok(bytes) => {
                self.backend.set(key, bytes, ttl).await;
                debug!(key, total = set.total, "stored pagination cache entry");
            }
            Err(error) => warn!(key, error = %error, "failed to encode pagination cache entry"),
        }
        set
    }

    pub async fn invalidate(&self, key: &str) {
        self.backend.remove(key).await;
        debug!(key, "invalidated pagination cache entry");
    }
}
