//! Free-text place resolution with progressive query relaxation.
//!
//! A query like `"General Luna, Siargao, Philippines"` is tried as given,
//! then with trailing components dropped, until the geocoder answers. The
//! whole resolution is memoized: found places and stable "not found"
//! answers are cached, transport failures are not.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use wayfare_core::{GeoResolution, Resolution, ResolverSection, WayfareResult};
use wayfare_storage::{CacheRead, ChunkStore, MemoCache};

use crate::providers::{GeocodeRequest, GeocodingBackend};
use crate::variants::query_variants;

/// Cache operation identifier for resolutions.
pub const RESOLVE_OPERATION: &str = "resolve_geo_query";

/// Tuning for [`GeoResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub ttl: Duration,
    /// Pause before each variant after the first.
    pub variant_delay: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from_section(&ResolverSection::default())
    }
}

impl ResolverOptions {
    pub fn from_section(section: &ResolverSection) -> Self {
        Self {
            ttl: section.ttl(),
            variant_delay: section.variant_delay(),
        }
    }
}

/// Resolves place queries through a geocoder and the shared cache.
pub struct GeoResolver<G, S> {
    geocoder: G,
    cache: Arc<MemoCache<S>>,
    options: ResolverOptions,
}

impl<G, S> GeoResolver<G, S>
where
    G: GeocodingBackend,
    S: ChunkStore,
{
    pub fn new(geocoder: G, cache: Arc<MemoCache<S>>, options: ResolverOptions) -> Self {
        Self {
            geocoder,
            cache,
            options,
        }
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    /// Resolve `query`, `Ok(None)` meaning no variant matched.
    ///
    /// Blank queries are `Ok(None)` without touching the geocoder or cache.
    pub async fn lookup(&self, query: &str) -> WayfareResult<CacheRead<Option<GeoResolution>>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(CacheRead::computed(None));
        }
        self.cache
            .try_get_or_compute(
                RESOLVE_OPERATION,
                self.options.ttl,
                &(query,),
                self.resolve_uncached(query),
            )
            .await
    }

    /// Resolve `query` into a presentation outcome.
    pub async fn resolve(&self, query: &str) -> CacheRead<Resolution> {
        match self.lookup(query).await {
            Ok(read) => read.map(|found| match found {
                Some(resolution) => Resolution::Found(resolution),
                None => Resolution::NotFound,
            }),
            Err(e) => {
                tracing::warn!(query, error = %e, "Geo resolution failed");
                CacheRead::computed(Resolution::Error(e.to_string()))
            }
        }
    }

    /// Try each variant in order, bypassing the cache.
    ///
    /// The first non-empty answer wins. A geocoder error ends the attempt
    /// at once; later variants are not tried.
    pub async fn resolve_uncached(&self, query: &str) -> WayfareResult<Option<GeoResolution>> {
        for (attempt, variant) in query_variants(query).into_iter().enumerate() {
            if attempt > 0 && !self.options.variant_delay.is_zero() {
                tokio::time::sleep(self.options.variant_delay).await;
            }
            tracing::debug!(query, variant = %variant, attempt, "Geocoding attempt");

            let matches = self
                .geocoder
                .search(&GeocodeRequest::best_match(variant.clone()))
                .await?;
            if let Some(best) = matches.into_iter().next() {
                return Ok(Some(best.into_resolution(variant)));
            }
        }
        Ok(None)
    }

    /// Resolve every query in order, recording each in `session`.
    pub async fn resolve_batch<Q: AsRef<str>>(
        &self,
        queries: &[Q],
        session: &mut SessionLog,
    ) -> Vec<Resolution> {
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            let query = query.as_ref();
            let (resolution, cache_hit) = self.resolve(query).await.into_parts();
            session.record(query, &resolution, cache_hit);
            results.push(resolution);
        }
        results
    }
}

/// One resolved query in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub query: String,
    /// `found`, `not_found` or `error`.
    pub outcome: &'static str,
    pub cache_hit: bool,
    /// The same query was already resolved earlier in this session.
    pub repeated: bool,
}

impl SessionEntry {
    /// One log line, marked by where the answer came from.
    pub fn render(&self) -> String {
        format!(
            "[{}] {} ({})",
            if self.cache_hit { "cached" } else { "new" },
            self.query,
            self.outcome
        )
    }
}

/// Per-session record of resolved queries.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    entries: Vec<SessionEntry>,
    seen: HashSet<String>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, query: &str, resolution: &Resolution, cache_hit: bool) {
        let normalized = query.trim().to_string();
        let repeated = !self.seen.insert(normalized.clone());
        self.entries.push(SessionEntry {
            query: normalized,
            outcome: resolution.label(),
            cache_hit,
            repeated,
        });
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_seen(&self, query: &str) -> bool {
        self.seen.contains(query.trim())
    }

    pub fn cache_hits(&self) -> usize {
        self.entries.iter().filter(|e| e.cache_hit).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}
