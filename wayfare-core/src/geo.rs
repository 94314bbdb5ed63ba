//! Geographic result types shared by the resolver and candidate search.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Offset Overpass adds to an OSM relation id to address it as an area.
pub const OVERPASS_AREA_OFFSET: u64 = 3_600_000_000;

/// Lat/lon extent of a resolved place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Parse the `[south, north, west, east]` string array Nominatim returns.
    pub fn from_nominatim(raw: &[String]) -> Option<Self> {
        if raw.len() != 4 {
            return None;
        }
        let mut parsed = [0.0f64; 4];
        for (slot, text) in parsed.iter_mut().zip(raw) {
            *slot = text.trim().parse().ok()?;
        }
        Some(Self {
            south: parsed[0],
            north: parsed[1],
            west: parsed[2],
            east: parsed[3],
        })
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }
}

/// A free-text place resolved to coordinates and, when available, a boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResolution {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bounding_box: Option<BoundingBox>,
    /// GeoJSON geometry (Polygon, MultiPolygon, or Point) as returned upstream.
    pub boundary: Option<serde_json::Value>,
    /// The query variant that produced the match.
    pub matched_query: String,
}

impl GeoResolution {
    /// True if the boundary is an area geometry rather than a point.
    pub fn has_area_boundary(&self) -> bool {
        self.boundary
            .as_ref()
            .and_then(|geometry| geometry.get("type"))
            .and_then(|kind| kind.as_str())
            .map(|kind| kind == "Polygon" || kind == "MultiPolygon")
            .unwrap_or(false)
    }
}

/// Outcome of resolving one query, as handed to presentation code.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(GeoResolution),
    NotFound,
    Error(String),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(&self) -> Option<&GeoResolution> {
        match self {
            Self::Found(resolution) => Some(resolution),
            _ => None,
        }
    }

    /// Short label used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::Error(_) => "error",
        }
    }
}

/// Kind of OSM element a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

/// One possible match for a place name, used for disambiguation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub population: Option<u64>,
    pub country_scope: Option<String>,
    pub element: ElementKind,
    pub osm_id: u64,
    /// Every tag on the upstream record.
    pub raw_attributes: BTreeMap<String, String>,
}

impl PlaceCandidate {
    /// Number of descriptive attributes on the record.
    pub fn attribute_count(&self) -> usize {
        self.raw_attributes.len()
    }

    /// Population used for ranking. Missing population ranks as zero.
    pub fn ranking_population(&self) -> u64 {
        self.population.unwrap_or(0)
    }
}

/// A country administrative boundary addressed as an Overpass area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryArea {
    pub iso_code: String,
    pub relation_id: u64,
    pub area_id: u64,
}

impl CountryArea {
    pub fn from_relation(iso_code: impl Into<String>, relation_id: u64) -> Self {
        Self {
            iso_code: iso_code.into(),
            relation_id,
            area_id: OVERPASS_AREA_OFFSET + relation_id,
        }
    }
}

/// Outline of a named administrative boundary.
///
/// Each ring is one outer member way, as `[lon, lat]` pairs in way order.
/// Rings are kept as fetched and are not stitched together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminBoundary {
    pub name: String,
    pub relation_id: u64,
    pub outer_rings: Vec<Vec<[f64; 2]>>,
}

impl AdminBoundary {
    /// Name used when the relation carries no `name` tag.
    pub const UNNAMED: &'static str = "Unknown";

    pub fn point_count(&self) -> usize {
        self.outer_rings.iter().map(Vec::len).sum()
    }

    /// A GeoJSON FeatureCollection holding one Polygon feature whose
    /// coordinates are the outer rings.
    pub fn to_feature_collection(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": self.outer_rings,
                },
                "properties": { "name": self.name },
            }],
        })
    }
}
