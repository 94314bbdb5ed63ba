//! Overpass HTTP client

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use wayfare_core::{
    invalid_response, request_failed, AdminBoundary, CountryArea, OverpassSection, WayfareResult,
};

use super::query;
use super::types::{assemble_boundary, OverpassElement, OverpassResponse};
use crate::providers::{
    http_client, transport_error, AreaElement, AreaSearchBackend, CountryFilter,
};

const SERVICE: &str = "overpass";

/// Overpass API client. Queries are POSTed as the `data` form field.
pub struct OverpassClient {
    client: Client,
    base_url: String,
}

impl OverpassClient {
    /// Create a new Overpass client.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://overpass-api.de/api")
    /// * `user_agent` - Identifying `User-Agent`
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> WayfareResult<Self> {
        Ok(Self {
            client: http_client(user_agent, timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &OverpassSection) -> WayfareResult<Self> {
        Self::new(
            config.base_url.clone(),
            &config.user_agent,
            config.request_timeout(),
        )
    }

    pub fn interpreter_url(&self) -> String {
        format!("{}/interpreter", self.base_url)
    }

    /// Run a QL query and return the raw elements.
    pub async fn run(&self, ql: &str) -> WayfareResult<Vec<OverpassElement>> {
        let response = self
            .client
            .post(self.interpreter_url())
            .form(&[("data", ql)])
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

        let parsed: OverpassResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(SERVICE, format!("Failed to parse response: {}", e)))?;
        if let Some(remark) = parsed.runtime_error() {
            return Err(invalid_response(SERVICE, remark.to_string()));
        }
        Ok(parsed.elements)
    }
}

#[async_trait]
impl AreaSearchBackend for OverpassClient {
    async fn places_named(
        &self,
        name: &str,
        area: Option<&CountryArea>,
    ) -> WayfareResult<Vec<AreaElement>> {
        let elements = self.run(&query::places_named(name, area)).await?;
        Ok(elements
            .into_iter()
            .filter_map(OverpassElement::into_area_element)
            .collect())
    }

    async fn country_relations(&self, filter: &CountryFilter) -> WayfareResult<Vec<u64>> {
        let elements = self.run(&query::country_relations(filter)).await?;
        Ok(elements
            .into_iter()
            .filter(|element| element.kind == "relation")
            .map(|element| element.id)
            .collect())
    }

    async fn admin_boundary(&self, name: &str) -> WayfareResult<Option<AdminBoundary>> {
        let elements = self.run(&query::admin_boundary(name)).await?;
        let boundary = assemble_boundary(&elements);
        tracing::debug!(
            name,
            elements = elements.len(),
            found = boundary.is_some(),
            "Boundary elements fetched"
        );
        Ok(boundary)
    }
}

impl std::fmt::Debug for OverpassClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverpassClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
