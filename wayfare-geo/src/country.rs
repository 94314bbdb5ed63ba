//! Country boundary lookup for scoping candidate searches.

use std::sync::Arc;
use std::time::Duration;

use wayfare_core::{CountryArea, WayfareResult};
use wayfare_storage::{ChunkStore, MemoCache};

use crate::providers::{AreaSearchBackend, CountryFilter};

/// Cache operation identifier for country areas.
pub const COUNTRY_AREA_OPERATION: &str = "country_area_id";

/// Finds (and caches) the Overpass area of a country.
pub struct CountryAreaLookup<A, S> {
    backend: A,
    cache: Arc<MemoCache<S>>,
    ttl: Duration,
}

impl<A, S> CountryAreaLookup<A, S>
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

    pub fn backend(&self) -> &A {
        &self.backend
    }

    pub fn cache(&self) -> &Arc<MemoCache<S>> {
        &self.cache
    }

    /// Area for the country with ISO code `iso_code`, falling back to an
    /// exact match on `name`. `Ok(None)` when neither finds a boundary.
    pub async fn area_for(
        &self,
        iso_code: &str,
        name: Option<&str>,
    ) -> WayfareResult<Option<CountryArea>> {
        let backend = &self.backend;
        let op = self.cache.memoize(
            COUNTRY_AREA_OPERATION,
            self.ttl,
            move |(iso_code, name): (String, Option<String>)| async move {
                find_area(backend, &iso_code, name.as_deref()).await
            },
        );
        let iso_code = iso_code.trim().to_ascii_uppercase();
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        Ok(op.try_call((iso_code, name)).await?.into_value())
    }
}

async fn find_area<A: AreaSearchBackend>(
    backend: &A,
    iso_code: &str,
    name: Option<&str>,
) -> WayfareResult<Option<CountryArea>> {
    if !iso_code.is_empty() {
        let relations = backend
            .country_relations(&CountryFilter::IsoCode(iso_code.to_string()))
            .await?;
        if let Some(&relation_id) = relations.first() {
            return Ok(Some(CountryArea::from_relation(iso_code, relation_id)));
        }
    }

    if let Some(name) = name {
        tracing::debug!(iso_code, name, "No boundary for ISO code, trying name");
        let relations = backend
            .country_relations(&CountryFilter::Name(name.to_string()))
            .await?;
        if let Some(&relation_id) = relations.first() {
            return Ok(Some(CountryArea::from_relation(iso_code, relation_id)));
        }
    }

    Ok(None)
}
