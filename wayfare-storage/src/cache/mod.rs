//! Memoizing cache layered on a [`ChunkStore`](crate::store::ChunkStore).
//!
//! Values are encoded with the core codec, split into chunks no larger than
//! the store's payload bound, and written under a key derived from the
//! operation identifier and its arguments. Reads return [`CacheRead<T>`],
//! which says whether the value came from the cache.
//!
//! # Example
//!
//! ```ignore
//! let cache = MemoCache::with_defaults(Arc::new(InMemoryChunkStore::new()));
//! let lookup = cache.memoize("resolve_geo_query", Duration::from_secs(48 * 3600), |q: String| {
//!     resolver.resolve_uncached(q)
//! });
//!
//! let read = lookup.call("Siargao".to_string()).await;
//! if read.was_cache_hit() {
//!     tracing::debug!("served from cache");
//! }
//! ```

pub mod chunking;
pub mod memo;
pub mod read;

pub use chunking::{assemble, split_payload, Assembly};
pub use memo::{CacheConfig, CacheStats, MemoCache, MemoizedOp};
pub use read::CacheRead;
