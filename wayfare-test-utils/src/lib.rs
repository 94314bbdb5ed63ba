//! Wayfare Test Utilities
//!
//! Shared test infrastructure for the Wayfare workspace:
//! - Scripted geocoding and area search backends that record their calls
//! - Proptest generators for queries and place records
//! - Fixtures for common scenarios
//! - Assertions for Wayfare error kinds

pub use wayfare_core::{
    AdminBoundary, CountryArea, ElementKind, GeoResolution, PlaceCandidate, Resolution, TransportError,
    WayfareError, WayfareResult,
};
pub use wayfare_geo::{
    AreaElement, AreaSearchBackend, CountryFilter, GeocodeMatch, GeocodeRequest,
    GeocodingBackend,
};
pub use wayfare_storage::{InMemoryChunkStore, MemoCache};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

// ============================================================================
// SCRIPTED BACKENDS
// ============================================================================

/// What a scripted backend does for one request.
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Answer(T),
    /// Fail with an HTTP status.
    Fail(u16),
}

fn read_calls<T: Clone>(calls: &RwLock<Vec<T>>) -> Vec<T> {
    calls.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn push_call<T>(calls: &RwLock<Vec<T>>, call: T) {
    calls.write().unwrap_or_else(|e| e.into_inner()).push(call);
}

/// Geocoder answering from a script keyed by exact query text.
///
/// Unscripted queries have no match.
#[derive(Debug, Default)]
pub struct ScriptedGeocoder {
    script: HashMap<String, Scripted<Vec<GeocodeMatch>>>,
    calls: RwLock<Vec<GeocodeRequest>>,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with a single match at the given position.
    pub fn answering(mut self, query: &str, latitude: f64, longitude: f64) -> Self {
        let found = fixtures::geocode_match(query, latitude, longitude);
        self.script
            .insert(query.to_string(), Scripted::Answer(vec![found]));
        self
    }

    pub fn answering_with(mut self, query: &str, matches: Vec<GeocodeMatch>) -> Self {
        self.script
            .insert(query.to_string(), Scripted::Answer(matches));
        self
    }

    pub fn failing(mut self, query: &str, status: u16) -> Self {
        self.script.insert(query.to_string(), Scripted::Fail(status));
        self
    }

    /// Query texts in the order they were requested.
    pub fn queries(&self) -> Vec<String> {
        read_calls(&self.calls)
            .into_iter()
            .map(|request| request.query)
            .collect()
    }

    pub fn requests(&self) -> Vec<GeocodeRequest> {
        read_calls(&self.calls)
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl GeocodingBackend for ScriptedGeocoder {
    async fn search(&self, request: &GeocodeRequest) -> WayfareResult<Vec<GeocodeMatch>> {
        push_call(&self.calls, request.clone());
        match self.script.get(&request.query) {
            Some(Scripted::Answer(matches)) => {
                Ok(matches.iter().take(request.limit as usize).cloned().collect())
            }
            Some(Scripted::Fail(status)) => Err(wayfare_core::request_failed(
                "scripted-geocoder",
                *status,
                "scripted failure",
            )),
            None => Ok(Vec::new()),
        }
    }
}

/// One recorded area search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaCall {
    Places { name: String, area_id: Option<u64> },
    Country(CountryFilter),
    Boundary(String),
}

/// Area search answering from scripted places and country boundaries.
#[derive(Debug, Default)]
pub struct ScriptedAreaSearch {
    places: HashMap<String, Scripted<Vec<AreaElement>>>,
    countries: Vec<(CountryFilter, u64)>,
    fail_countries: Option<u16>,
    boundaries: HashMap<String, Scripted<AdminBoundary>>,
    calls: RwLock<Vec<AreaCall>>,
}

impl ScriptedAreaSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_places(mut self, name: &str, elements: Vec<AreaElement>) -> Self {
        self.places
            .insert(name.to_string(), Scripted::Answer(elements));
        self
    }

    pub fn failing_places(mut self, name: &str, status: u16) -> Self {
        self.places.insert(name.to_string(), Scripted::Fail(status));
        self
    }

    pub fn with_country(mut self, filter: CountryFilter, relation_id: u64) -> Self {
        self.countries.push((filter, relation_id));
        self
    }

    pub fn failing_countries(mut self, status: u16) -> Self {
        self.fail_countries = Some(status);
        self
    }

    pub fn with_boundary(mut self, name: &str, boundary: AdminBoundary) -> Self {
        self.boundaries
            .insert(name.to_string(), Scripted::Answer(boundary));
        self
    }

    pub fn failing_boundary(mut self, name: &str, status: u16) -> Self {
        self.boundaries
            .insert(name.to_string(), Scripted::Fail(status));
        self
    }

    pub fn calls(&self) -> Vec<AreaCall> {
        read_calls(&self.calls)
    }

    pub fn place_calls(&self) -> Vec<AreaCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, AreaCall::Places { .. }))
            .collect()
    }

    pub fn country_calls(&self) -> Vec<AreaCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, AreaCall::Country(_)))
            .collect()
    }

    pub fn boundary_calls(&self) -> Vec<AreaCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, AreaCall::Boundary(_)))
            .collect()
    }
}

#[async_trait]
impl AreaSearchBackend for ScriptedAreaSearch {
    async fn places_named(
        &self,
        name: &str,
        area: Option<&CountryArea>,
    ) -> WayfareResult<Vec<AreaElement>> {
        push_call(
            &self.calls,
            AreaCall::Places {
                name: name.to_string(),
                area_id: area.map(|a| a.area_id),
            },
        );
        match self.places.get(name) {
            Some(Scripted::Answer(elements)) => Ok(elements.clone()),
            Some(Scripted::Fail(status)) => Err(wayfare_core::request_failed(
                "scripted-area-search",
                *status,
                "scripted failure",
            )),
            None => Ok(Vec::new()),
        }
    }

    async fn country_relations(&self, filter: &CountryFilter) -> WayfareResult<Vec<u64>> {
        push_call(&self.calls, AreaCall::Country(filter.clone()));
        if let Some(status) = self.fail_countries {
            return Err(wayfare_core::request_failed(
                "scripted-area-search",
                status,
                "scripted failure",
            ));
        }
        Ok(self
            .countries
            .iter()
            .filter(|(known, _)| known == filter)
            .map(|(_, id)| *id)
            .collect())
    }

    async fn admin_boundary(&self, name: &str) -> WayfareResult<Option<AdminBoundary>> {
        push_call(&self.calls, AreaCall::Boundary(name.to_string()));
        match self.boundaries.get(name) {
            Some(Scripted::Answer(boundary)) => Ok(Some(boundary.clone())),
            Some(Scripted::Fail(status)) => Err(wayfare_core::request_failed(
                "scripted-area-search",
                *status,
                "scripted failure",
            )),
            None => Ok(None),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Wayfare inputs.

    use super::*;
    use proptest::prelude::*;

    /// A place name component, never blank.
    pub fn arb_component() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{1,8}( [A-Z][a-z]{1,8})?"
    }

    /// A comma-delimited place query of one to five components.
    pub fn arb_place_query() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_component(), 1..=5).prop_map(|parts| parts.join(", "))
    }

    pub fn arb_latitude() -> impl Strategy<Value = f64> {
        -90.0f64..=90.0
    }

    pub fn arb_longitude() -> impl Strategy<Value = f64> {
        -180.0f64..=180.0
    }

    pub fn arb_element_kind() -> impl Strategy<Value = ElementKind> {
        prop_oneof![
            Just(ElementKind::Node),
            Just(ElementKind::Way),
            Just(ElementKind::Relation),
        ]
    }

    /// Tags with an optional population and some filler attributes.
    pub fn arb_tags() -> impl Strategy<Value = BTreeMap<String, String>> {
        (
            arb_component(),
            proptest::option::of(0u64..20_000_000),
            prop::collection::btree_map("[a-z:_]{1,12}", "[a-z0-9 ]{0,12}", 0..6),
        )
            .prop_map(|(name, population, mut tags)| {
                tags.insert("name".to_string(), name);
                match population {
                    Some(population) => {
                        tags.insert("population".to_string(), population.to_string());
                    }
                    None => {
                        tags.remove("population");
                    }
                }
                tags
            })
    }

    pub fn arb_area_element() -> impl Strategy<Value = AreaElement> {
        (
            arb_element_kind(),
            1u64..10_000_000_000,
            arb_latitude(),
            arb_longitude(),
            arb_tags(),
        )
            .prop_map(|(kind, id, lat, lon, tags)| AreaElement {
                kind,
                id,
                position: Some((lat, lon)),
                tags,
            })
    }

    pub fn arb_place_candidate() -> impl Strategy<Value = PlaceCandidate> {
        arb_area_element().prop_map(|element| {
            let population = element
                .tags
                .get("population")
                .and_then(|p| p.parse().ok());
            let (latitude, longitude) = element.position.unwrap_or_default();
            PlaceCandidate {
                name: element.tags.get("name").cloned().unwrap_or_default(),
                latitude,
                longitude,
                population,
                country_scope: None,
                element: element.kind,
                osm_id: element.id,
                raw_attributes: element.tags,
            }
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use wayfare_geo::{CandidateOptions, ResolverOptions};

    /// An empty in-memory cache.
    pub fn memory_cache() -> Arc<MemoCache<InMemoryChunkStore>> {
        Arc::new(MemoCache::with_defaults(Arc::new(InMemoryChunkStore::new())))
    }

    /// Resolver options without the inter-variant pause.
    pub fn quick_resolver_options() -> ResolverOptions {
        ResolverOptions {
            ttl: Duration::from_secs(48 * 3600),
            variant_delay: Duration::ZERO,
        }
    }

    pub fn candidate_options() -> CandidateOptions {
        CandidateOptions::default()
    }

    pub fn geocode_match(query: &str, latitude: f64, longitude: f64) -> GeocodeMatch {
        GeocodeMatch {
            display_name: format!("{}, Resolved", query),
            latitude,
            longitude,
            bounding_box: None,
            boundary: Some(serde_json::json!({
                "type": "Point",
                "coordinates": [longitude, latitude],
            })),
        }
    }

    /// A node named `name` carrying `extra` filler tags.
    pub fn place_node(id: u64, name: &str, population: Option<&str>, extra: usize) -> AreaElement {
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), name.to_string());
        tags.insert("place".to_string(), "town".to_string());
        if let Some(population) = population {
            tags.insert("population".to_string(), population.to_string());
        }
        for i in 0..extra {
            tags.insert(format!("extra:{}", i), "yes".to_string());
        }
        AreaElement {
            kind: ElementKind::Node,
            id,
            position: Some((10.0 + id as f64 / 100.0, 120.0)),
            tags,
        }
    }

    /// A two-ring outline named `name`.
    pub fn island_boundary(name: &str) -> AdminBoundary {
        AdminBoundary {
            name: name.to_string(),
            relation_id: 3_452_419,
            outer_rings: vec![
                vec![[126.0, 9.7], [126.2, 9.7], [126.2, 9.9]],
                vec![[126.2, 9.9], [126.0, 9.9], [126.0, 9.7]],
            ],
        }
    }

    /// Three towns called Luna with differing detail.
    pub fn luna_towns() -> Vec<AreaElement> {
        vec![
            place_node(1, "Luna", None, 0),
            place_node(2, "Luna", Some("35,802"), 0),
            place_node(3, "Luna", None, 3),
        ]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Wayfare error kinds.

    use super::*;

    #[track_caller]
    pub fn assert_transport_error<T: std::fmt::Debug>(result: &WayfareResult<T>) {
        match result {
            Err(WayfareError::Transport(_)) => {}
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &WayfareResult<T>) {
        match result {
            Err(WayfareError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert a resolution matched through `query`.
    #[track_caller]
    pub fn assert_found_via(resolution: &Resolution, query: &str) {
        match resolution {
            Resolution::Found(found) => assert_eq!(found.matched_query, query),
            other => panic!("Expected Found via {:?}, got: {:?}", query, other),
        }
    }
}
