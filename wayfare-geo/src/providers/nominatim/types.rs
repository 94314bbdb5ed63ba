//! Nominatim API response types

use serde::Deserialize;
use wayfare_core::BoundingBox;

use crate::providers::GeocodeMatch;

/// One entry of a `/search?format=json` response.
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimPlace {
    pub display_name: String,
    /// Decimal degrees, sent as a string.
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub boundingbox: Option<Vec<String>>,
    #[serde(default)]
    pub geojson: Option<serde_json::Value>,
}

impl NominatimPlace {
    /// Convert to a match, parsing the string coordinates.
    pub fn into_match(self) -> Result<GeocodeMatch, String> {
        let latitude: f64 = self
            .lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid lat {:?}", self.lat))?;
        let longitude: f64 = self
            .lon
            .trim()
            .parse()
            .map_err(|_| format!("invalid lon {:?}", self.lon))?;
        let bounding_box = self
            .boundingbox
            .as_deref()
            .and_then(BoundingBox::from_nominatim);

        Ok(GeocodeMatch {
            display_name: self.display_name,
            latitude,
            longitude,
            bounding_box,
            boundary: self.geojson,
        })
    }
}
