//! Place candidate search and ranking.
//!
//! Every city, town and village sharing a name is fetched from the area
//! search backend, optionally within one country, and ranked so that the
//! most likely intended place comes first: larger population first, then
//! the better-described record. Ties keep backend order.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use wayfare_core::{CandidatesSection, PlaceCandidate, ValidationError, WayfareResult};
use wayfare_storage::{CacheRead, ChunkStore, MemoCache};

use crate::country::CountryAreaLookup;
use crate::providers::{AreaElement, AreaSearchBackend};

/// Cache operation identifier for candidate searches.
pub const CANDIDATES_OPERATION: &str = "search_place_candidates";

/// Country a search is restricted to. Both fields take part in the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryScope {
    /// ISO 3166-1 alpha-2 code.
    pub iso_code: String,
    /// Boundary name, tried when the code finds nothing.
    pub name: Option<String>,
}

impl CountryScope {
    pub fn new(iso_code: impl Into<String>) -> Self {
        Self {
            iso_code: iso_code.into().trim().to_ascii_uppercase(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        self.name = (!name.is_empty()).then(|| name.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateOptions {
    pub ttl: Duration,
    pub country_area_ttl: Duration,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self::from_section(&CandidatesSection::default())
    }
}

impl CandidateOptions {
    pub fn from_section(section: &CandidatesSection) -> Self {
        Self {
            ttl: section.ttl(),
            country_area_ttl: section.country_area_ttl(),
        }
    }
}

/// Searches place candidates through an area backend and the shared cache.
pub struct CandidateSearch<A, S> {
    countries: CountryAreaLookup<A, S>,
    ttl: Duration,
}

impl<A, S> CandidateSearch<A, S>
where
    A: AreaSearchBackend,
    S: ChunkStore,
{
    pub fn new(backend: A, cache: Arc<MemoCache<S>>, options: CandidateOptions) -> Self {
        Self {
            countries: CountryAreaLookup::new(backend, cache, options.country_area_ttl),
            ttl: options.ttl,
        }
    }

    pub fn backend(&self) -> &A {
        self.countries.backend()
    }

    pub fn countries(&self) -> &CountryAreaLookup<A, S> {
        &self.countries
    }

    /// Ranked candidates named `name`, optionally within `scope`.
    ///
    /// No match is an empty list. A backend failure is returned and not
    /// cached.
    pub async fn search(
        &self,
        name: &str,
        scope: Option<&CountryScope>,
    ) -> WayfareResult<CacheRead<Vec<PlaceCandidate>>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".to_string(),
                reason: "place name must not be empty".to_string(),
            }
            .into());
        }

        self.countries
            .cache()
            .try_get_or_compute(
                CANDIDATES_OPERATION,
                self.ttl,
                &(name, scope),
                self.search_uncached(name, scope),
            )
            .await
    }

    /// The top ranked candidate, if any.
    pub async fn best_candidate(
        &self,
        name: &str,
        scope: Option<&CountryScope>,
    ) -> WayfareResult<Option<PlaceCandidate>> {
        Ok(self.search(name, scope).await?.into_value().into_iter().next())
    }

    async fn search_uncached(
        &self,
        name: &str,
        scope: Option<&CountryScope>,
    ) -> WayfareResult<Vec<PlaceCandidate>> {
        let area = match scope {
            Some(scope) => {
                let area = self
                    .countries
                    .area_for(&scope.iso_code, scope.name.as_deref())
                    .await?;
                if area.is_none() {
                    tracing::warn!(
                        name,
                        iso_code = %scope.iso_code,
                        "Unknown country; searching without scope"
                    );
                }
                area
            }
            None => None,
        };

        let elements = self.backend().places_named(name, area.as_ref()).await?;
        let scope_code = area.as_ref().map(|a| a.iso_code.as_str());
        let mut candidates: Vec<PlaceCandidate> = elements
            .into_iter()
            .filter_map(|element| element_to_candidate(element, name, scope_code))
            .collect();
        rank_candidates(&mut candidates);

        tracing::debug!(name, count = candidates.len(), "Place candidates fetched");
        Ok(candidates)
    }
}

/// Sort by population, then attribute count, both descending.
///
/// Missing population counts as zero. The sort is stable.
pub fn rank_candidates(candidates: &mut [PlaceCandidate]) {
    candidates.sort_by(compare_candidates);
}

fn compare_candidates(a: &PlaceCandidate, b: &PlaceCandidate) -> Ordering {
    b.ranking_population()
        .cmp(&a.ranking_population())
        .then_with(|| b.attribute_count().cmp(&a.attribute_count()))
}

/// Parse a population tag, tolerating digit grouping.
///
/// `"12,345"` and `"12 345"` both give `12345`; anything else that is not a
/// plain integer is `None`.
pub fn parse_population(raw: &str) -> Option<u64> {
    let digits: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Build a candidate from a backend element. Elements without a position
/// are dropped.
pub fn element_to_candidate(
    element: AreaElement,
    searched_name: &str,
    country_scope: Option<&str>,
) -> Option<PlaceCandidate> {
    let (latitude, longitude) = element.position?;
    let name = element
        .tags
        .get("name")
        .cloned()
        .unwrap_or_else(|| searched_name.to_string());
    let population = element.tags.get("population").and_then(|p| parse_population(p));

    Some(PlaceCandidate {
        name,
        latitude,
        longitude,
        population,
        country_scope: country_scope.map(str::to_string),
        element: element.kind,
        osm_id: element.id,
        raw_attributes: element.tags,
    })
}
