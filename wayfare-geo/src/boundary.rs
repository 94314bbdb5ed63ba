//! Administrative boundary outlines as GeoJSON.
//!
//! A boundary is looked up by its English name and its outer member ways
//! become the rings of a single Polygon feature. Outlines, including the
//! absence of one, are cached; backend failures are not.

use std::sync::Arc;
use std::time::Duration;

use wayfare_core::{AdminBoundary, BoundarySection, ValidationError, WayfareResult};
use wayfare_storage::{CacheRead, ChunkStore, MemoCache};

use crate::providers::AreaSearchBackend;

/// Cache operation identifier for boundary outlines.
pub const BOUNDARY_OPERATION: &str = "fetch_osm_boundary";

/// Fetches (and caches) administrative boundary outlines.
pub struct BoundaryLookup<A, S> {
    backend: A,
    cache: Arc<MemoCache<S>>,
    ttl: Duration,
}

impl<A, S> BoundaryLookup<A, S>
where
    A: AreaSearchBackend,
    S: ChunkStore,
{
    pub fn new(backend: A, cache: Arc<MemoCache<S>>, ttl: Duration) -> Self {
        Self {
            backend,
            cache,
            ttl,
        }
    }

    pub fn from_section(backend: A, cache: Arc<MemoCache<S>>, section: &BoundarySection) -> Self {
        Self::new(backend, cache, section.ttl())
    }

    pub fn backend(&self) -> &A {
        &self.backend
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Outline of the boundary named `name`, `None` when there is none.
    pub async fn boundary_for(
        &self,
        name: &str,
    ) -> WayfareResult<CacheRead<Option<AdminBoundary>>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".to_string(),
                reason: "boundary name must not be empty".to_string(),
            }
            .into());
        }

        let backend = &self.backend;
        let op = self
            .cache
            .memoize(BOUNDARY_OPERATION, self.ttl, move |name: String| async move {
                backend.admin_boundary(&name).await
            });
        let read = op.try_call(name.to_string()).await?;
        tracing::debug!(
            name,
            cache_hit = read.was_cache_hit(),
            found = read.value().is_some(),
            "Boundary lookup"
        );
        Ok(read)
    }

    /// The outline as a GeoJSON FeatureCollection.
    pub async fn geojson_for(&self, name: &str) -> WayfareResult<Option<serde_json::Value>> {
        Ok(self
            .boundary_for(name)
            .await?
            .value()
            .as_ref()
            .map(AdminBoundary::to_feature_collection))
    }
}
