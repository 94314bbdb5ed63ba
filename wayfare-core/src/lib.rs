//! Wayfare Core - Shared Types
//!
//! Data types, the value codec, cache key derivation, configuration and
//! telemetry setup. Every other Wayfare crate depends on this one.

use chrono::{DateTime, Utc};

pub mod codec;
pub mod config;
pub mod error;
pub mod geo;
pub mod key;
pub mod telemetry;

pub use config::{
    BoundarySection, CacheSection, CandidatesSection, NominatimSection, OverpassSection,
    ResolverSection, StoreKind, TelemetrySection, WayfareConfig,
};
pub use error::{
    invalid_response, request_failed, CodecError, ConfigError, StoreError, StoreResult,
    TransportError, ValidationError, WayfareError, WayfareResult,
};
pub use geo::{
    AdminBoundary, BoundingBox, CountryArea, ElementKind, GeoResolution, PlaceCandidate,
    Resolution, OVERPASS_AREA_OFFSET,
};
pub use key::{CacheKey, CallArgs};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
