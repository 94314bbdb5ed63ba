//! Wayfare Storage - Chunk Stores and Memoizing Cache
//!
//! Defines the chunk store abstraction, its in-memory and LMDB
//! implementations, and the cache that memoizes slow operations on top.

pub mod cache;
pub mod store;

pub use cache::{CacheConfig, CacheRead, CacheStats, MemoCache, MemoizedOp};
pub use store::{
    CacheChunk, ChunkPage, ChunkStore, InMemoryChunkStore, LmdbChunkStore, PageToken, StoreLimits,
};
