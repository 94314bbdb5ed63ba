//! External geographic services.
//!
//! Each service sits behind a trait so the resolver and candidate search can
//! run against scripted backends in tests. The reqwest clients here are the
//! production implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wayfare_core::{
    AdminBoundary, BoundingBox, CountryArea, ElementKind, GeoResolution, TransportError, WayfareError,
    WayfareResult,
};

pub mod nominatim;
pub mod overpass;

pub use nominatim::NominatimClient;
pub use overpass::OverpassClient;

// ============================================================================
// GEOCODING
// ============================================================================

/// A free-text geocoding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeRequest {
    pub query: String,
    pub limit: u32,
    /// Ask for the boundary geometry along with the point.
    pub with_boundary: bool,
}

impl GeocodeRequest {
    /// Best single match, boundary included.
    pub fn best_match(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 1,
            with_boundary: true,
        }
    }
}

/// One geocoder result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bounding_box: Option<BoundingBox>,
    pub boundary: Option<serde_json::Value>,
}

impl GeocodeMatch {
    pub fn into_resolution(self, matched_query: impl Into<String>) -> GeoResolution {
        GeoResolution {
            display_name: self.display_name,
            latitude: self.latitude,
            longitude: self.longitude,
            bounding_box: self.bounding_box,
            boundary: self.boundary,
            matched_query: matched_query.into(),
        }
    }
}

/// Free-text place search.
#[async_trait]
pub trait GeocodingBackend: Send + Sync {
    /// Matches for the request, best first. An empty list means no match.
    async fn search(&self, request: &GeocodeRequest) -> WayfareResult<Vec<GeocodeMatch>>;
}

// ============================================================================
// AREA SEARCH
// ============================================================================

/// A tagged OSM element returned by an area search.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaElement {
    pub kind: ElementKind,
    pub id: u64,
    /// Own position for nodes, center for ways and relations.
    pub position: Option<(f64, f64)>,
    pub tags: BTreeMap<String, String>,
}

/// How to find a country's boundary relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryFilter {
    /// ISO 3166-1 alpha-2 code.
    IsoCode(String),
    /// Exact name of the boundary.
    Name(String),
}

/// Structured search over tagged map data.
#[async_trait]
pub trait AreaSearchBackend: Send + Sync {
    /// Cities, towns and villages called `name`, optionally inside `area`.
    async fn places_named(
        &self,
        name: &str,
        area: Option<&CountryArea>,
    ) -> WayfareResult<Vec<AreaElement>>;

    /// Ids of the country-level boundary relations matching `filter`.
    async fn country_relations(&self, filter: &CountryFilter) -> WayfareResult<Vec<u64>>;

    /// Outline of the administrative boundary whose English name is `name`.
    /// `Ok(None)` when there is no such relation or it has no outer ways.
    async fn admin_boundary(&self, name: &str) -> WayfareResult<Option<AdminBoundary>>;
}

// ============================================================================
// HELPERS
// ============================================================================

/// Map a reqwest failure to a transport error.
pub(crate) fn transport_error(service: &str, e: reqwest::Error) -> WayfareError {
    if e.is_timeout() {
        return WayfareError::Transport(TransportError::Timeout {
            service: service.to_string(),
        });
    }
    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
    wayfare_core::request_failed(service, status, format!("HTTP request failed: {}", e))
}

/// Build the shared reqwest client for one service.
pub(crate) fn http_client(
    user_agent: &str,
    timeout: std::time::Duration,
) -> WayfareResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| {
            WayfareError::Config(wayfare_core::ConfigError::InvalidValue {
                field: "user_agent",
                reason: format!("cannot build HTTP client: {}", e),
            })
        })
}
