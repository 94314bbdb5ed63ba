//! In-memory chunk store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use wayfare_core::{StoreError, StoreResult, Timestamp};

use super::{CacheChunk, ChunkPage, ChunkStore, PageToken, StoreLimits};

type RowKey = (String, u32);

/// Chunk store kept in a `BTreeMap`, for tests and single-process use.
///
/// Rows are never evicted on their own; call [`purge_expired`](Self::purge_expired)
/// to drop stale ones. [`set_available`](Self::set_available) simulates an
/// outage: every call fails with `StoreError::Unavailable` until it is
/// switched back on.
#[derive(Debug)]
pub struct InMemoryChunkStore {
    rows: RwLock<BTreeMap<RowKey, CacheChunk>>,
    limits: StoreLimits,
    available: AtomicBool,
    puts: AtomicU64,
    queries: AtomicU64,
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::dynamo_like())
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            limits,
            available: AtomicBool::new(true),
            puts: AtomicU64::new(0),
            queries: AtomicU64::new(0),
        }
    }

    /// Toggle simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Total rows held, expired or not.
    pub fn chunk_count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    /// Rows held under one cache key.
    pub fn chunks_for(&self, cache_key: &str) -> Vec<CacheChunk> {
        match self.rows.read() {
            Ok(rows) => rows
                .range(range_for(cache_key, 0))
                .map(|(_, chunk)| chunk.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of `put_chunk` calls that reached the store.
    pub fn put_calls(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Number of `query_chunks` calls that reached the store.
    pub fn query_calls(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Drop every row whose expiry is at or before `now`. Returns rows removed.
    pub fn purge_expired(&self, now: Timestamp) -> StoreResult<usize> {
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        let before = rows.len();
        rows.retain(|_, chunk| !chunk.is_expired(now));
        Ok(before - rows.len())
    }

    /// Overwrite a row without limit checks.
    pub fn insert_raw(&self, chunk: CacheChunk) -> StoreResult<()> {
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        rows.insert((chunk.cache_key.clone(), chunk.chunk_index), chunk);
        Ok(())
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "in-memory store switched off".to_string(),
            })
        }
    }
}

fn range_for(cache_key: &str, start: u32) -> std::ops::RangeInclusive<RowKey> {
    (cache_key.to_string(), start)..=(cache_key.to_string(), u32::MAX)
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    fn limits(&self) -> StoreLimits {
        self.limits
    }

    async fn put_chunk(&self, chunk: &CacheChunk) -> StoreResult<()> {
        self.ensure_available()?;
        self.limits.check(chunk)?;
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.insert_raw(chunk.clone())
    }

    async fn query_chunks(
        &self,
        cache_key: &str,
        page: Option<PageToken>,
    ) -> StoreResult<ChunkPage> {
        self.ensure_available()?;
        self.queries.fetch_add(1, Ordering::Relaxed);

        let start = page.map(|token| token.start_index()).unwrap_or(0);
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut matching = rows.range(range_for(cache_key, start)).map(|(_, c)| c);

        let chunks: Vec<CacheChunk> = matching
            .by_ref()
            .take(self.limits.page_size.max(1))
            .cloned()
            .collect();
        let next = match (matching.next(), chunks.last()) {
            (Some(_), Some(last)) => last.chunk_index.checked_add(1).map(PageToken::starting_at),
            _ => None,
        };
        Ok(ChunkPage { chunks, next })
    }
}
