//! Namespaced TTL store.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use globset::{Glob, GlobMatcher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::patterns::{PatternStat, PatternTracker};
use crate::telemetry;
use crate::{MuninnError, Result};

/// Namespace used when a call does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Configuration for [`CacheLayer`].
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(5_000)
///     .default_ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries across all namespaces. Default: 1,000.
    pub max_size: usize,
    /// TTL applied when a set does not specify one. Default: 1 hour.
    #[serde(deserialize_with = "crate::config::duration_secs::deserialize")]
    pub default_ttl: Duration,
    /// Capacity of the pattern frequency table. Default: 10,000.
    pub pattern_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000,
            default_ttl: Duration::from_secs(3600),
            pattern_capacity: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn pattern_capacity(mut self, n: u64) -> Self {
        self.pattern_capacity = n;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(MuninnError::Configuration(
                "cache max_size must be at least 1".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(MuninnError::Configuration(
                "cache default_ttl must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-write options for [`CacheLayer::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub namespace: Option<String>,
    /// Query-shape tag fed to the pattern tracker.
    pub pattern: Option<String>,
    /// How long producing the value took, for pattern timing.
    pub response_time: Option<Duration>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn response_time(mut self, elapsed: Duration) -> Self {
        self.response_time = Some(elapsed);
        self
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    /// Entries removed by invalidation.
    pub deletes: u64,
    /// Entries removed to make room for a new key.
    pub evictions: u64,
    /// Entries removed because their TTL ran out.
    pub expirations: u64,
    pub size: usize,
    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub hit_rate: f64,
    pub per_namespace: BTreeMap<String, usize>,
}

struct CacheEntry {
    value: serde_json::Value,
    created_at: Instant,
    expires_at: Instant,
    hit_count: u64,
    /// Insertion sequence, breaks `created_at` ties.
    seq: u64,
}

impl CacheEntry {
    /// Live through `expires_at` itself; gone strictly after it.
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Default)]
struct Store {
    namespaces: HashMap<String, HashMap<String, CacheEntry>>,
    len: usize,
    next_seq: u64,
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    evictions: u64,
    expirations: u64,
}

impl Store {
    fn remove(&mut self, namespace: &str, key: &str) -> bool {
        let Some(entries) = self.namespaces.get_mut(namespace) else {
            return false;
        };
        let removed = entries.remove(key).is_some();
        if entries.is_empty() {
            self.namespaces.remove(namespace);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let mut purged = 0;
        for entries in self.namespaces.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            purged += before - entries.len();
        }
        self.namespaces.retain(|_, entries| !entries.is_empty());
        self.len -= purged;
        self.expirations += purged as u64;
        purged
    }

    /// Fewest hits, then oldest.
    fn eviction_victim(&self) -> Option<(String, String)> {
        self.namespaces
            .iter()
            .flat_map(|(ns, entries)| entries.iter().map(move |(key, entry)| (ns, key, entry)))
            .min_by_key(|(_, _, entry)| (entry.hit_count, entry.created_at, entry.seq))
            .map(|(ns, key, _)| (ns.clone(), key.clone()))
    }
}

/// In-memory, namespaced cache with TTL, bounded size and pattern learning.
///
/// All map access happens under a `std::sync::Mutex` held only for the
/// duration of a lookup or write, never across an `.await`.
pub struct CacheLayer {
    config: CacheConfig,
    store: Mutex<Store>,
    patterns: PatternTracker,
}

impl CacheLayer {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            patterns: PatternTracker::new(config.pattern_capacity),
            store: Mutex::new(Store::default()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`. Expired entries are removed and count as a miss, as
    /// do values that no longer deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, namespace: Option<&str>) -> Option<T> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let now = Instant::now();
        let mut guard = self.lock();
        let store = &mut *guard;

        let expired = store
            .namespaces
            .get(namespace)
            .and_then(|e| e.get(key))
            .map(|entry| entry.is_expired(now));
        let Some(expired) = expired else {
            store.misses += 1;
            drop(guard);
            record_miss(namespace);
            return None;
        };
        if expired {
            store.remove(namespace, key);
            store.expirations += 1;
            store.misses += 1;
            drop(guard);
            record_miss(namespace);
            return None;
        }

        let entry = store
            .namespaces
            .get_mut(namespace)
            .and_then(|e| e.get_mut(key))?;
        match serde_json::from_value::<T>(entry.value.clone()) {
            Ok(value) => {
                entry.hit_count += 1;
                store.hits += 1;
                drop(guard);
                debug!(namespace, key, "cache hit");
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "namespace" => namespace.to_owned())
                    .increment(1);
                Some(value)
            }
            Err(e) => {
                store.misses += 1;
                drop(guard);
                warn!(namespace, key, error = %e, "cached value has unexpected shape");
                record_miss(namespace);
                None
            }
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// A zero TTL is rejected. A value that fails to serialize is logged and
    /// skipped; the call still succeeds.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) -> Result<()> {
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            return Err(MuninnError::InvalidInput(
                "cache ttl must be positive".to_string(),
            ));
        }
        let namespace = options.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(namespace, key, error = %e, "skipping cache write for unserializable value");
                return Ok(());
            }
        };

        let now = Instant::now();
        let mut evicted = 0u64;
        {
            let mut guard = self.lock();
            let store = &mut *guard;
            let exists = store
                .namespaces
                .get(namespace)
                .is_some_and(|e| e.contains_key(key));

            if !exists && store.len >= self.config.max_size.max(1) {
                store.purge_expired(now);
                while store.len >= self.config.max_size.max(1) {
                    let Some((ns, victim)) = store.eviction_victim() else {
                        break;
                    };
                    store.remove(&ns, &victim);
                    store.evictions += 1;
                    evicted += 1;
                    debug!(namespace = %ns, key = %victim, "evicted cache entry");
                }
            }

            let seq = store.next_seq;
            store.next_seq += 1;
            let entries = store.namespaces.entry(namespace.to_owned()).or_default();
            let hit_count = entries.get(key).map_or(0, |e| e.hit_count);
            let previous = entries.insert(
                key.to_owned(),
                CacheEntry {
                    value,
                    created_at: now,
                    expires_at: now + ttl,
                    hit_count,
                    seq,
                },
            );
            if previous.is_none() {
                store.len += 1;
            }
            store.sets += 1;
        }

        if evicted > 0 {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(evicted);
        }
        if let Some(pattern) = options.pattern.as_deref() {
            self.patterns.record(pattern, options.response_time);
        }
        Ok(())
    }

    /// Return the cached value, or run `fetch` once, cache its output and
    /// return it. Fetch errors pass through uncached.
    ///
    /// Concurrent callers missing on the same key each run their own fetch.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        options: SetOptions,
        fetch: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(key, options.namespace.as_deref()) {
            return Ok(value);
        }
        let started = Instant::now();
        let value = fetch().await?;
        let options = SetOptions {
            response_time: options.response_time.or(Some(started.elapsed())),
            ..options
        };
        if let Err(e) = self.set(key, &value, options) {
            warn!(key, error = %e, "failed to cache fetched value");
        }
        Ok(value)
    }

    /// Remove entries whose key matches the glob `pattern`, optionally only
    /// within `namespace`. With neither argument the whole cache is cleared.
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: Option<&str>, namespace: Option<&str>) -> Result<usize> {
        let matcher = pattern.map(compile_glob).transpose()?;
        let mut guard = self.lock();
        let store = &mut *guard;

        let mut removed = 0;
        for (ns, entries) in store.namespaces.iter_mut() {
            if namespace.is_some_and(|wanted| wanted != ns.as_str()) {
                continue;
            }
            let before = entries.len();
            match &matcher {
                Some(glob) => entries.retain(|key, _| !glob.is_match(key)),
                None => entries.clear(),
            }
            removed += before - entries.len();
        }
        store.namespaces.retain(|_, entries| !entries.is_empty());
        store.len -= removed;
        store.deletes += removed as u64;
        drop(guard);

        if removed > 0 {
            debug!(?pattern, ?namespace, removed, "invalidated cache entries");
        }
        Ok(removed)
    }

    /// Purge expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        let lookups = store.hits + store.misses;
        CacheStats {
            hits: store.hits,
            misses: store.misses,
            sets: store.sets,
            deletes: store.deletes,
            evictions: store.evictions,
            expirations: store.expirations,
            size: store.len,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                store.hits as f64 / lookups as f64
            },
            per_namespace: store
                .namespaces
                .iter()
                .map(|(ns, entries)| (ns.clone(), entries.len()))
                .collect(),
        }
    }

    /// The `n` most frequent query patterns.
    pub fn pattern_stats(&self, n: usize) -> Vec<PatternStat> {
        self.patterns.top(n)
    }

    pub fn patterns(&self) -> &PatternTracker {
        &self.patterns
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` until the cache is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.cleanup();
                if purged > 0 {
                    debug!(purged, "cache sweep");
                }
            }
        })
    }
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn record_miss(namespace: &str) {
    metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "namespace" => namespace.to_owned())
        .increment(1);
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| MuninnError::InvalidPattern {
            pattern: pattern.to_owned(),
            message: e.to_string(),
        })
}
