//! LMDB-backed chunk store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a persistent,
//! memory-mapped store that survives process restarts.
//!
//! # Row layout
//!
//! LMDB caps keys at 511 bytes, well under the cache key bound, so rows are
//! addressed by `sha256(cache_key) ‖ 0x00 ‖ chunk_index (u32, big-endian)`.
//! Big-endian indices make a prefix scan return chunks in index order. The
//! value is the JSON-encoded [`CacheChunk`], full cache key included, and
//! reads skip any row whose stored key differs from the one requested.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use sha2::{Digest, Sha256};
use wayfare_core::{StoreError, StoreResult, Timestamp};

use super::{CacheChunk, ChunkPage, ChunkStore, PageToken, StoreLimits};

const KEY_HASH_LEN: usize = 32;
const ROW_PREFIX_LEN: usize = KEY_HASH_LEN + 1;
const ROW_KEY_LEN: usize = ROW_PREFIX_LEN + 4;

/// Persistent chunk store on LMDB.
pub struct LmdbChunkStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    path: PathBuf,
    limits: StoreLimits,
}

impl std::fmt::Debug for LmdbChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbChunkStore")
            .field("path", &self.path)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Map size in bytes, saturating for oversized configurations.
fn map_size_bytes(max_size_mb: usize) -> usize {
    max_size_mb.saturating_mul(1024 * 1024)
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        reason: e.to_string(),
    }
}

impl LmdbChunkStore {
    /// Open (or create) a store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> StoreResult<Self> {
        Self::open_with_limits(path, max_size_mb, StoreLimits::dynamo_like())
    }

    pub fn open_with_limits<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        limits: StoreLimits,
    ) -> StoreResult<Self> {
        std::fs::create_dir_all(&path).map_err(|e| StoreError::Unavailable {
            reason: format!("cannot create {}: {}", path.as_ref().display(), e),
        })?;

        // SAFETY: the environment is opened once per store and never
        // concurrently re-opened with a different map size by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_bytes(max_size_mb))
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| StoreError::Unavailable {
            reason: format!("failed to open LMDB environment: {}", e),
        })?;

        let mut wtxn = env.write_txn().map_err(backend)?;
        let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None).map_err(backend)?;
        wtxn.commit().map_err(backend)?;

        Ok(Self {
            env,
            db,
            path: path.as_ref().to_path_buf(),
            limits,
        })
    }

    /// Delete every row whose expiry is at or before `now`. Returns rows removed.
    pub fn purge_expired(&self, now: Timestamp) -> StoreResult<usize> {
        let stale: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(backend)?;
            let mut stale = Vec::new();
            for entry in self.db.iter(&rtxn).map_err(backend)? {
                let (key, bytes) = entry.map_err(backend)?;
                let expired = serde_json::from_slice::<CacheChunk>(bytes)
                    .map(|chunk| chunk.is_expired(now))
                    .unwrap_or(true);
                if expired {
                    stale.push(key.to_vec());
                }
            }
            stale
        };

        if stale.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self.env.write_txn().map_err(backend)?;
        for key in &stale {
            self.db.delete(&mut wtxn, key).map_err(backend)?;
        }
        wtxn.commit().map_err(backend)?;

        tracing::debug!(removed = stale.len(), "Purged expired cache chunks");
        Ok(stale.len())
    }

    /// Total rows held, expired or not.
    pub fn chunk_count(&self) -> StoreResult<u64> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        self.db.len(&rtxn).map_err(backend)
    }
}

fn row_prefix(cache_key: &str) -> [u8; ROW_PREFIX_LEN] {
    let mut prefix = [0u8; ROW_PREFIX_LEN];
    prefix[..KEY_HASH_LEN].copy_from_slice(&Sha256::digest(cache_key.as_bytes()));
    prefix
}

fn row_key(cache_key: &str, chunk_index: u32) -> [u8; ROW_KEY_LEN] {
    let mut key = [0u8; ROW_KEY_LEN];
    key[..ROW_PREFIX_LEN].copy_from_slice(&row_prefix(cache_key));
    key[ROW_PREFIX_LEN..].copy_from_slice(&chunk_index.to_be_bytes());
    key
}

fn index_of(row_key: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = row_key.get(ROW_PREFIX_LEN..ROW_KEY_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

#[async_trait]
impl ChunkStore for LmdbChunkStore {
    fn limits(&self) -> StoreLimits {
        self.limits
    }

    async fn put_chunk(&self, chunk: &CacheChunk) -> StoreResult<()> {
        self.limits.check(chunk)?;
        let key = row_key(&chunk.cache_key, chunk.chunk_index);
        let value = serde_json::to_vec(chunk).map_err(backend)?;

        let mut wtxn = self.env.write_txn().map_err(backend)?;
        self.db.put(&mut wtxn, &key, &value).map_err(backend)?;
        wtxn.commit().map_err(backend)?;
        Ok(())
    }

    async fn query_chunks(
        &self,
        cache_key: &str,
        page: Option<PageToken>,
    ) -> StoreResult<ChunkPage> {
        let start = page.map(|token| token.start_index()).unwrap_or(0);
        let page_size = self.limits.page_size.max(1);
        let prefix = row_prefix(cache_key);

        let rtxn = self.env.read_txn().map_err(backend)?;
        let mut chunks = Vec::new();
        let mut next = None;

        for entry in self.db.prefix_iter(&rtxn, &prefix).map_err(backend)? {
            let (key, bytes) = entry.map_err(backend)?;
            let Some(index) = index_of(key) else {
                continue;
            };
            if index < start {
                continue;
            }
            let chunk: CacheChunk = match serde_json::from_slice(bytes) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(error = %e, chunk_index = index, "Skipping unreadable cache row");
                    continue;
                }
            };
            if chunk.cache_key != cache_key {
                continue;
            }
            if chunks.len() == page_size {
                next = Some(PageToken::starting_at(index));
                break;
            }
            chunks.push(chunk);
        }

        Ok(ChunkPage { chunks, next })
    }
}
