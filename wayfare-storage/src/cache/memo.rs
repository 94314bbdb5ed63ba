//! Memoizing cache over a chunk store.
//!
//! Reads collect every chunk under the key and serve the value only when
//! the entry is complete and unexpired. Misses run the computation and
//! write the result back. The store is never allowed to fail a call: read
//! and write faults are logged and the value is computed uncached.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wayfare_core::{codec, CacheKey, CacheSection, CallArgs, StoreError, StoreResult, Timestamp};

use super::chunking::{assemble, split_payload, Assembly};
use super::read::CacheRead;
use crate::store::{CacheChunk, ChunkStore, StoreLimits};

/// Configuration for the memoizing cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Tighter key bound than the store's own, if any.
    pub max_key_bytes: Option<usize>,
    /// Tighter chunk payload bound than the store's own, if any.
    pub max_payload_bytes: Option<usize>,
    /// Upper bound on pages fetched for one key.
    pub max_pages: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_key_bytes: None,
            max_payload_bytes: None,
            max_pages: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_section(section: &CacheSection) -> Self {
        Self {
            max_key_bytes: section.max_key_bytes,
            max_payload_bytes: section.max_payload_bytes,
            ..Self::default()
        }
    }

    /// Set the key bound.
    pub fn with_max_key_bytes(mut self, max: usize) -> Self {
        self.max_key_bytes = Some(max);
        self
    }

    /// Set the chunk payload bound.
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = Some(max);
        self
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls served from the cache.
    pub hits: u64,
    /// Calls that ran the computation.
    pub misses: u64,
    /// Complete entries whose payload failed to decode.
    pub decode_failures: u64,
    /// Store reads or writes that failed.
    pub store_errors: u64,
    /// Values fully written.
    pub writes: u64,
    /// Chunks written, across all values.
    pub chunks_written: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    decode_failures: AtomicU64,
    store_errors: AtomicU64,
    writes: AtomicU64,
    chunks_written: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Memoizing cache shared by every cached operation.
///
/// Operations are told apart by the identifier embedded in each key, so one
/// store can back all of them.
#[derive(Debug)]
pub struct MemoCache<S> {
    store: Arc<S>,
    limits: StoreLimits,
    max_pages: usize,
    counters: Counters,
}

impl<S: ChunkStore> MemoCache<S> {
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        let limits = store
            .limits()
            .restricted(config.max_key_bytes, config.max_payload_bytes);
        Self {
            store,
            limits,
            max_pages: config.max_pages.max(1),
            counters: Counters::default(),
        }
    }

    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, CacheConfig::default())
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Effective bounds: the store's, tightened by the config.
    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            store_errors: c.store_errors.load(Ordering::Relaxed),
            writes: c.writes.load(Ordering::Relaxed),
            chunks_written: c.chunks_written.load(Ordering::Relaxed),
        }
    }

    /// Wrap `f` so each call goes through the cache under `operation`.
    pub fn memoize<F>(
        &self,
        operation: impl Into<String>,
        ttl: Duration,
        f: F,
    ) -> MemoizedOp<'_, S, F> {
        MemoizedOp {
            cache: self,
            operation: operation.into(),
            ttl,
            f,
        }
    }

    /// Key for `operation` called with `args`, or `None` when the arguments
    /// cannot be encoded. Such calls run uncached.
    pub fn key_for<A: Serialize + ?Sized>(&self, operation: &str, args: &A) -> Option<CacheKey> {
        let derived = CallArgs::from_serialize(args)
            .and_then(|call| CacheKey::derive(operation, &call, self.limits.max_key_bytes));
        match derived {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(operation, error = %e, "Arguments not encodable; calling uncached");
                None
            }
        }
    }

    /// Serve `compute` through the cache.
    pub async fn get_or_compute<A, T, Fut>(
        &self,
        operation: &str,
        ttl: Duration,
        args: &A,
        compute: Fut,
    ) -> CacheRead<T>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = T>,
    {
        let key = self.key_for(operation, args);
        self.run(operation, ttl, key, compute).await
    }

    /// Serve a fallible `compute` through the cache. `Err` results are
    /// returned as-is and never written.
    pub async fn try_get_or_compute<A, T, E, Fut>(
        &self,
        operation: &str,
        ttl: Duration,
        args: &A,
        compute: Fut,
    ) -> Result<CacheRead<T>, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key_for(operation, args);
        self.try_run(operation, ttl, key, compute).await
    }

    async fn run<T, Fut>(
        &self,
        operation: &str,
        ttl: Duration,
        key: Option<CacheKey>,
        compute: Fut,
    ) -> CacheRead<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = T>,
    {
        let started = Instant::now();
        if let Some(key) = &key {
            if let Some(hit) = self.lookup(key).await {
                self.finish(operation, true, started);
                return hit;
            }
        }

        let value = compute.await;
        if let Some(key) = &key {
            self.store_value(key, &value, ttl).await;
        }
        self.finish(operation, false, started);
        CacheRead::computed(value)
    }

    async fn try_run<T, E, Fut>(
        &self,
        operation: &str,
        ttl: Duration,
        key: Option<CacheKey>,
        compute: Fut,
    ) -> Result<CacheRead<T>, E>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        if let Some(key) = &key {
            if let Some(hit) = self.lookup(key).await {
                self.finish(operation, true, started);
                return Ok(hit);
            }
        }

        let outcome = compute.await;
        self.finish(operation, false, started);
        let value = outcome?;
        if let Some(key) = &key {
            self.store_value(key, &value, ttl).await;
        }
        Ok(CacheRead::computed(value))
    }

    fn finish(&self, operation: &str, cache_hit: bool, started: Instant) {
        bump(if cache_hit {
            &self.counters.hits
        } else {
            &self.counters.misses
        });
        tracing::debug!(
            operation,
            cache_hit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Memoized call"
        );
    }

    async fn fetch_all(&self, key: &CacheKey) -> StoreResult<Vec<CacheChunk>> {
        let mut chunks = Vec::new();
        let mut token = None;
        for _ in 0..self.max_pages {
            let page = self.store.query_chunks(key.as_str(), token).await?;
            chunks.extend(page.chunks);
            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(chunks),
            }
        }
        Err(StoreError::Backend {
            reason: format!("more than {} pages under one key", self.max_pages),
        })
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CacheRead<T>> {
        let chunks = match self.fetch_all(key).await {
            Ok(chunks) => chunks,
            Err(e) => {
                bump(&self.counters.store_errors);
                tracing::warn!(
                    operation = key.operation(),
                    error = %e,
                    "Cache read failed; treating as miss"
                );
                return None;
            }
        };

        match assemble(chunks, Utc::now()) {
            Assembly::Complete {
                payload,
                written_at,
            } => match codec::decode::<T>(&payload) {
                Ok(value) => Some(CacheRead::from_cache(value, written_at)),
                Err(e) => {
                    bump(&self.counters.decode_failures);
                    tracing::warn!(
                        operation = key.operation(),
                        error = %e,
                        "Cached payload undecodable; treating as miss"
                    );
                    None
                }
            },
            Assembly::Incomplete => {
                tracing::debug!(operation = key.operation(), "Cache entry incomplete");
                None
            }
            Assembly::Absent | Assembly::Expired => None,
        }
    }

    async fn store_value<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let payload = match codec::encode(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(operation = key.operation(), error = %e, "Value not cacheable");
                return;
            }
        };

        let parts = split_payload(&payload, self.limits.max_payload_bytes);
        let written_at = Utc::now();
        let (Ok(chunk_count), Some(expires_at)) =
            (u32::try_from(parts.len()), expiry(written_at, ttl))
        else {
            tracing::warn!(
                operation = key.operation(),
                chunks = parts.len(),
                ttl_secs = ttl.as_secs(),
                "Entry out of range; not cached"
            );
            return;
        };

        // Head chunk last, so a complete head implies a complete tail.
        let order = (1..parts.len()).chain(std::iter::once(0));
        for index in order {
            let chunk = CacheChunk {
                cache_key: key.as_str().to_string(),
                chunk_index: index as u32,
                chunk_count,
                payload: parts[index].to_string(),
                expires_at,
                written_at,
            };
            if let Err(e) = self.store.put_chunk(&chunk).await {
                bump(&self.counters.store_errors);
                tracing::warn!(
                    operation = key.operation(),
                    chunk_index = index,
                    error = %e,
                    "Cache write failed; value not cached"
                );
                return;
            }
            bump(&self.counters.chunks_written);
        }
        bump(&self.counters.writes);
    }
}

fn expiry(written_at: Timestamp, ttl: Duration) -> Option<Timestamp> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    written_at.checked_add_signed(ttl)
}

/// An operation bound to a cache, an identifier and a TTL.
pub struct MemoizedOp<'c, S, F> {
    cache: &'c MemoCache<S>,
    operation: String,
    ttl: Duration,
    f: F,
}

impl<'c, S: ChunkStore, F> MemoizedOp<'c, S, F> {
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Call through the cache.
    pub async fn call<A, T, Fut>(&self, args: A) -> CacheRead<T>
    where
        F: Fn(A) -> Fut,
        A: Serialize,
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = T>,
    {
        let key = self.cache.key_for(&self.operation, &args);
        self.cache
            .run(&self.operation, self.ttl, key, (self.f)(args))
            .await
    }

    /// Call a fallible operation through the cache. Errors are not cached.
    pub async fn try_call<A, T, E, Fut>(&self, args: A) -> Result<CacheRead<T>, E>
    where
        F: Fn(A) -> Fut,
        A: Serialize,
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.cache.key_for(&self.operation, &args);
        self.cache
            .try_run(&self.operation, self.ttl, key, (self.f)(args))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryChunkStore;
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache() -> MemoCache<InMemoryChunkStore> {
        MemoCache::with_defaults(Arc::new(InMemoryChunkStore::new()))
    }

    fn tiny_chunks(payload: usize, page_size: usize) -> MemoCache<InMemoryChunkStore> {
        let store = InMemoryChunkStore::with_limits(StoreLimits {
            max_key_bytes: 1024,
            max_payload_bytes: payload,
            page_size,
        });
        MemoCache::with_defaults(Arc::new(store))
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Place {
        name: String,
        population: Option<u64>,
    }

    #[tokio::test]
    async fn test_second_call_is_hit() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let double = cache.memoize("double", HOUR, |n: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { n * 2 }
        });

        let first = double.call(21).await;
        assert_eq!(*first.value(), 42);
        assert!(!first.was_cache_hit());

        let second = double.call(21).await;
        assert_eq!(*second.value(), 42);
        assert!(second.was_cache_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_distinct_args_distinct_entries() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let op = cache.memoize("square", HOUR, |n: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { n * n }
        });
        assert_eq!(op.call(3).await.into_value(), 9);
        assert_eq!(op.call(4).await.into_value(), 16);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_operations_do_not_share_entries() {
        let cache = cache();
        let a = cache
            .get_or_compute("op_a", HOUR, &("x",), async { "from a".to_string() })
            .await;
        let b = cache
            .get_or_compute("op_b", HOUR, &("x",), async { "from b".to_string() })
            .await;
        assert!(!a.was_cache_hit());
        assert!(!b.was_cache_hit());
        assert_eq!(b.into_value(), "from b");
    }

    #[tokio::test]
    async fn test_zero_ttl_always_recomputes() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let op = cache.memoize("instant", Duration::ZERO, |s: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { s.len() }
        });

        assert!(!op.call("abc".to_string()).await.was_cache_hit());
        assert!(!op.call("abc".to_string()).await.was_cache_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hit_turns_into_miss_after_ttl() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let op = cache.memoize("short_lived", Duration::from_millis(50), |s: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { s.to_uppercase() }
        });

        assert!(!op.call("luna".to_string()).await.was_cache_hit());
        let hit = op.call("luna".to_string()).await;
        assert!(hit.was_cache_hit());
        assert_eq!(hit.into_value(), "LUNA");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let expired = op.call("luna".to_string()).await;
        assert!(!expired.was_cache_hit());
        assert_eq!(expired.into_value(), "LUNA");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(op.call("luna".to_string()).await.was_cache_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_value_spanning_many_pages() {
        let cache = tiny_chunks(16, 3);
        let big = Place {
            name: "A very long place name that needs many chunks".repeat(4),
            population: Some(12_345),
        };

        let first = cache
            .get_or_compute("big", HOUR, &"k", async { big.clone() })
            .await;
        assert!(!first.was_cache_hit());
        let stats = cache.stats();
        assert!(stats.chunks_written > 9, "expected more chunks than three pages hold");

        let second: CacheRead<Place> = cache
            .get_or_compute("big", HOUR, &"k", async {
                Place {
                    name: "recomputed".to_string(),
                    population: None,
                }
            })
            .await;
        assert!(second.was_cache_hit());
        assert_eq!(second.into_value(), big);
    }

    #[tokio::test]
    async fn test_store_outage_degrades_to_miss() {
        let store = Arc::new(InMemoryChunkStore::new());
        store.set_available(false);
        let cache = MemoCache::with_defaults(store.clone());

        let read = cache
            .get_or_compute("op", HOUR, &1, async { "value".to_string() })
            .await;
        assert_eq!(read.value(), "value");
        assert!(!read.was_cache_hit());

        let stats = cache.stats();
        assert_eq!(stats.store_errors, 2, "one failed read and one failed write");
        assert_eq!(stats.writes, 0);

        store.set_available(true);
        let again = cache
            .get_or_compute("op", HOUR, &1, async { "value".to_string() })
            .await;
        assert!(!again.was_cache_hit());
        let cached = cache
            .get_or_compute("op", HOUR, &1, async { "other".to_string() })
            .await;
        assert!(cached.was_cache_hit());
        assert_eq!(cached.value(), "value");
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let flaky = cache.memoize("flaky", HOUR, |n: u32| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(format!("attempt {} failed", attempt))
                } else {
                    Ok(n + 1)
                }
            }
        });

        assert!(flaky.try_call(1).await.is_err());
        let ok = flaky.try_call(1).await.unwrap();
        assert!(!ok.was_cache_hit());
        assert_eq!(*ok.value(), 2);

        let hit = flaky.try_call(1).await.unwrap();
        assert!(hit.was_cache_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_absent_answer_is_cached() {
        let cache = cache();
        let first: CacheRead<Option<Place>> = cache
            .get_or_compute("lookup", HOUR, &"Atlantis", async { None })
            .await;
        assert!(first.value().is_none());

        let second: CacheRead<Option<Place>> = cache
            .get_or_compute("lookup", HOUR, &"Atlantis", async {
                Some(Place {
                    name: "wrong".to_string(),
                    population: None,
                })
            })
            .await;
        assert!(second.was_cache_hit());
        assert!(second.value().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss_and_rewritten() {
        let store = Arc::new(InMemoryChunkStore::new());
        let cache = MemoCache::with_defaults(store.clone());
        let key = cache.key_for("op", &"k").unwrap();
        let now = Utc::now();
        store
            .insert_raw(CacheChunk {
                cache_key: key.as_str().to_string(),
                chunk_index: 0,
                chunk_count: 1,
                payload: "%%% not base64 %%%".to_string(),
                expires_at: now + chrono::Duration::hours(1),
                written_at: now,
            })
            .unwrap();

        let read = cache.get_or_compute("op", HOUR, &"k", async { 7u8 }).await;
        assert!(!read.was_cache_hit());
        assert_eq!(cache.stats().decode_failures, 1);

        let again = cache.get_or_compute("op", HOUR, &"k", async { 0u8 }).await;
        assert!(again.was_cache_hit());
        assert_eq!(again.into_value(), 7);
    }

    #[tokio::test]
    async fn test_partial_entry_is_miss() {
        let store = Arc::new(InMemoryChunkStore::new());
        let cache = MemoCache::with_defaults(store.clone());
        let key = cache.key_for("op", &"k").unwrap();
        let now = Utc::now();
        store
            .insert_raw(CacheChunk {
                cache_key: key.as_str().to_string(),
                chunk_index: 0,
                chunk_count: 3,
                payload: codec::encode(&1u8).unwrap(),
                expires_at: now + chrono::Duration::hours(1),
                written_at: now,
            })
            .unwrap();

        let read = cache.get_or_compute("op", HOUR, &"k", async { 2u8 }).await;
        assert!(!read.was_cache_hit());
        assert_eq!(read.into_value(), 2);
    }

    #[tokio::test]
    async fn test_shorter_rewrite_ignores_orphans() {
        let cache = tiny_chunks(8, 100);
        let long = "x".repeat(200);
        let short = "y".to_string();

        cache
            .get_or_compute("op", Duration::ZERO, &"k", async { long.clone() })
            .await;
        cache
            .get_or_compute("op", HOUR, &"k", async { short.clone() })
            .await;

        let read: CacheRead<String> = cache
            .get_or_compute("op", HOUR, &"k", async { "recomputed".to_string() })
            .await;
        assert!(read.was_cache_hit());
        assert_eq!(read.into_value(), short);
    }

    #[tokio::test]
    async fn test_long_arguments_still_cached() {
        let cache = cache();
        let query = "Calle ".repeat(500);
        let first = cache
            .get_or_compute("op", HOUR, &query, async { 1u8 })
            .await;
        assert!(!first.was_cache_hit());
        assert!(cache.key_for("op", &query).unwrap().len() <= 1024);

        let second = cache
            .get_or_compute("op", HOUR, &query, async { 2u8 })
            .await;
        assert!(second.was_cache_hit());
    }

    #[tokio::test]
    async fn test_config_tightens_payload_bound() {
        let store = Arc::new(InMemoryChunkStore::new());
        let cache = MemoCache::new(store.clone(), CacheConfig::new().with_max_payload_bytes(10));
        assert_eq!(cache.limits().max_payload_bytes, 10);

        cache
            .get_or_compute("op", HOUR, &"k", async { "0123456789abcdef".to_string() })
            .await;
        assert!(store.chunk_count() > 1);
    }

    #[tokio::test]
    async fn test_unencodable_value_served_uncached() {
        let cache = cache();
        let mut map = std::collections::HashMap::new();
        map.insert((1u8, 2u8), "pair".to_string());

        let first = cache
            .get_or_compute("op", HOUR, &"k", async { map.clone() })
            .await;
        assert_eq!(first.value().len(), 1);
        assert_eq!(cache.stats().writes, 0);
    }
}
