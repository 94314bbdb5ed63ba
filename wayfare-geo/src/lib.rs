//! Wayfare Geo - Place Resolution
//!
//! Resolves free-text place queries through a geocoder with progressive
//! query relaxation. Ranked place candidates and administrative boundary
//! outlines come from an area search backend. Every lookup runs through the
//! shared memoizing cache.

pub mod boundary;
pub mod candidates;
pub mod country;
pub mod providers;
pub mod resolver;
pub mod variants;

pub use boundary::{BoundaryLookup, BOUNDARY_OPERATION};
pub use candidates::{
    element_to_candidate, parse_population, rank_candidates, CandidateOptions, CandidateSearch,
    CountryScope, CANDIDATES_OPERATION,
};
pub use country::{CountryAreaLookup, COUNTRY_AREA_OPERATION};
pub use providers::{
    AreaElement, AreaSearchBackend, CountryFilter, GeocodeMatch, GeocodeRequest,
    GeocodingBackend, NominatimClient, OverpassClient,
};
pub use resolver::{
    GeoResolver, ResolverOptions, SessionEntry, SessionLog, RESOLVE_OPERATION,
};
pub use variants::query_variants;
