//! Chunk store abstraction.
//!
//! A store holds rows addressed by `(cache_key, chunk_index)` and returns
//! every row under a key in index order, one page at a time. It knows
//! nothing about expiry or completeness; the cache checks both on read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wayfare_core::{StoreError, StoreResult, Timestamp};

pub mod lmdb;
pub mod memory;

pub use lmdb::LmdbChunkStore;
pub use memory::InMemoryChunkStore;

/// Size bounds a store imposes on its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Largest cache key the store accepts, in bytes.
    pub max_key_bytes: usize,
    /// Largest chunk payload the store accepts, in bytes.
    pub max_payload_bytes: usize,
    /// Rows returned per `query_chunks` page.
    pub page_size: usize,
}

impl StoreLimits {
    /// Bounds modelled on a DynamoDB table: 1024-byte keys (half the 2048-byte
    /// partition key limit), 350 KB payloads under the 400 KB item limit.
    pub const fn dynamo_like() -> Self {
        Self {
            max_key_bytes: 1024,
            max_payload_bytes: 350_000,
            page_size: 100,
        }
    }

    /// Tighten the bounds. Overrides never loosen what the store allows.
    pub fn restricted(self, max_key_bytes: Option<usize>, max_payload_bytes: Option<usize>) -> Self {
        Self {
            max_key_bytes: max_key_bytes
                .map(|k| k.min(self.max_key_bytes))
                .unwrap_or(self.max_key_bytes),
            max_payload_bytes: max_payload_bytes
                .map(|p| p.min(self.max_payload_bytes))
                .unwrap_or(self.max_payload_bytes),
            page_size: self.page_size,
        }
    }

    /// Reject rows that would violate these bounds.
    pub fn check(&self, chunk: &CacheChunk) -> StoreResult<()> {
        if chunk.cache_key.len() > self.max_key_bytes {
            return Err(StoreError::KeyTooLong {
                len: chunk.cache_key.len(),
                max: self.max_key_bytes,
            });
        }
        if chunk.payload.len() > self.max_payload_bytes {
            return Err(StoreError::PayloadTooLarge {
                len: chunk.payload.len(),
                max: self.max_payload_bytes,
            });
        }
        Ok(())
    }
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::dynamo_like()
    }
}

/// One stored slice of an encoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheChunk {
    pub cache_key: String,
    pub chunk_index: u32,
    /// Total number of chunks in the entry this chunk belongs to.
    pub chunk_count: u32,
    pub payload: String,
    pub expires_at: Timestamp,
    pub written_at: Timestamp,
}

impl CacheChunk {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// Continuation point for a paginated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken(u32);

impl PageToken {
    /// Resume at `chunk_index`.
    pub fn starting_at(chunk_index: u32) -> Self {
        Self(chunk_index)
    }

    pub fn start_index(&self) -> u32 {
        self.0
    }
}

/// One page of chunks, ordered by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkPage {
    pub chunks: Vec<CacheChunk>,
    pub next: Option<PageToken>,
}

/// Key-value store for cache chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    fn limits(&self) -> StoreLimits;

    /// Write a chunk, replacing any row with the same key and index.
    async fn put_chunk(&self, chunk: &CacheChunk) -> StoreResult<()>;

    /// Fetch one page of the chunks stored under `cache_key`.
    async fn query_chunks(
        &self,
        cache_key: &str,
        page: Option<PageToken>,
    ) -> StoreResult<ChunkPage>;
}

#[async_trait]
impl<S: ChunkStore + ?Sized> ChunkStore for std::sync::Arc<S> {
    fn limits(&self) -> StoreLimits {
        (**self).limits()
    }

    async fn put_chunk(&self, chunk: &CacheChunk) -> StoreResult<()> {
        (**self).put_chunk(chunk).await
    }

    async fn query_chunks(
        &self,
        cache_key: &str,
        page: Option<PageToken>,
    ) -> StoreResult<ChunkPage> {
        (**self).query_chunks(cache_key, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn chunk(key: &str, payload: &str) -> CacheChunk {
        let now = Utc::now();
        CacheChunk {
            cache_key: key.to_string(),
            chunk_index: 0,
            chunk_count: 1,
            payload: payload.to_string(),
            expires_at: now + Duration::hours(1),
            written_at: now,
        }
    }

    #[test]
    fn test_restricted_never_loosens() {
        let limits = StoreLimits::dynamo_like().restricted(Some(4096), Some(1000));
        assert_eq!(limits.max_key_bytes, 1024);
        assert_eq!(limits.max_payload_bytes, 1000);
        assert_eq!(limits.page_size, 100);
    }

    #[test]
    fn test_check_bounds() {
        let limits = StoreLimits {
            max_key_bytes: 8,
            max_payload_bytes: 4,
            page_size: 10,
        };
        assert!(limits.check(&chunk("short", "abcd")).is_ok());
        assert_eq!(
            limits.check(&chunk("much-too-long", "a")),
            Err(StoreError::KeyTooLong { len: 13, max: 8 })
        );
        assert_eq!(
            limits.check(&chunk("k", "abcde")),
            Err(StoreError::PayloadTooLarge { len: 5, max: 4 })
        );
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let mut c = chunk("k", "v");
        let now = Utc::now();
        c.expires_at = now;
        assert!(c.is_expired(now));
        c.expires_at = now + Duration::seconds(1);
        assert!(!c.is_expired(now));
    }
}
