//! Nominatim HTTP client with request spacing

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use wayfare_core::{invalid_response, request_failed, NominatimSection, WayfareResult};

use super::types::NominatimPlace;
use crate::providers::{http_client, transport_error, GeocodeMatch, GeocodeRequest, GeocodingBackend};

const SERVICE: &str = "nominatim";

/// Nominatim search client.
///
/// Requests are spaced at least `min_interval` apart; the public instance
/// allows one request per second per client.
pub struct NominatimClient {
    client: Client,
    base_url: String,
    user_agent: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimClient {
    /// Create a new Nominatim client.
    ///
    /// # Arguments
    /// * `base_url` - Server root (e.g., "https://nominatim.openstreetmap.org")
    /// * `user_agent` - Identifying `User-Agent`, required by the usage policy
    /// * `timeout` - Per-request timeout
    /// * `min_interval` - Minimum spacing between requests
    pub fn new(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
        min_interval: Duration,
    ) -> WayfareResult<Self> {
        let user_agent = user_agent.into();
        Ok(Self {
            client: http_client(&user_agent, timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent,
            min_interval,
            last_request: Mutex::new(None),
        })
    }

    pub fn from_config(config: &NominatimSection) -> WayfareResult<Self> {
        Self::new(
            config.base_url.clone(),
            config.user_agent.clone(),
            config.request_timeout(),
            config.min_interval(),
        )
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    /// Wait until the spacing since the previous request has elapsed.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl GeocodingBackend for NominatimClient {
    async fn search(&self, request: &GeocodeRequest) -> WayfareResult<Vec<GeocodeMatch>> {
        self.pace().await;

        let limit = request.limit.max(1).to_string();
        let polygon = if request.with_boundary { "1" } else { "0" };
        let response = self
            .client
            .get(self.search_url())
            .query(&[
                ("q", request.query.as_str()),
                ("format", "json"),
                ("limit", limit.as_str()),
                ("polygon_geojson", polygon),
            ])
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(request_failed(SERVICE, status.as_u16(), body));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| invalid_response(SERVICE, format!("Failed to parse response: {}", e)))?;

        places
            .into_iter()
            .map(|place| place.into_match().map_err(|reason| invalid_response(SERVICE, reason)))
            .collect()
    }
}

impl std::fmt::Debug for NominatimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NominatimClient")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("min_interval", &self.min_interval)
            .finish()
    }
}
