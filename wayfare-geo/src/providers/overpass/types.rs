//! Overpass API response types

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use wayfare_core::{AdminBoundary, ElementKind};

use crate::providers::AreaElement;

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
    /// Set when the server aborted the query, e.g. on timeout.
    #[serde(default)]
    pub remark: Option<String>,
}

impl OverpassResponse {
    /// The server-side error, if the query did not run to completion.
    pub fn runtime_error(&self) -> Option<&str> {
        self.remark
            .as_deref()
            .filter(|remark| remark.contains("error"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub center: Option<Center>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Relation members, present with `out body`.
    #[serde(default)]
    pub members: Vec<Member>,
    /// Way points, present with `out geom`.
    #[serde(default)]
    pub geometry: Vec<Center>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub id: u64,
    #[serde(default)]
    pub role: String,
}

impl OverpassElement {
    /// Convert to an area element. Elements of other kinds are dropped.
    pub fn into_area_element(self) -> Option<AreaElement> {
        let kind = match self.kind.as_str() {
            "node" => ElementKind::Node,
            "way" => ElementKind::Way,
            "relation" => ElementKind::Relation,
            _ => return None,
        };
        let position = match (kind, self.lat, self.lon, self.center) {
            (ElementKind::Node, Some(lat), Some(lon), _) => Some((lat, lon)),
            (_, _, _, Some(center)) => Some((center.lat, center.lon)),
            _ => None,
        };
        Some(AreaElement {
            kind,
            id: self.id,
            position,
            tags: self.tags,
        })
    }
}

/// Build the outline of the first administrative relation that has at
/// least one outer way with geometry.
///
/// Inner rings and members of other roles or kinds are ignored. Outer ways
/// missing from the response are skipped.
pub fn assemble_boundary(elements: &[OverpassElement]) -> Option<AdminBoundary> {
    let ways: HashMap<u64, &[Center]> = elements
        .iter()
        .filter(|element| element.kind == "way" && !element.geometry.is_empty())
        .map(|element| (element.id, element.geometry.as_slice()))
        .collect();

    elements
        .iter()
        .filter(|element| {
            element.kind == "relation"
                && element.tags.get("boundary").map(String::as_str) == Some("administrative")
        })
        .find_map(|relation| {
            let outer_rings: Vec<Vec<[f64; 2]>> = relation
                .members
                .iter()
                .filter(|member| member.kind == "way" && member.role == "outer")
                .filter_map(|member| ways.get(&member.id))
                .map(|points| points.iter().map(|p| [p.lon, p.lat]).collect())
                .collect();
            if outer_rings.is_empty() {
                return None;
            }
            Some(AdminBoundary {
                name: relation
                    .tags
                    .get("name")
                    .cloned()
                    .unwrap_or_else(|| AdminBoundary::UNNAMED.to_string()),
                relation_id: relation.id,
                outer_rings,
            })
        })
}
