pub mod auth;
pub mod conditional_access;
pub mod directory;

use crate::config::{Config, ConfigManager, DEFAULT_GRAPH_BASE};
use crate::error::{Ca2TfError, Result};
use reqwest::Client;
use serde::Deserialize;

/// Graph API client. Every call is a single request; failures are surfaced, never retried.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl GraphClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, DEFAULT_GRAPH_BASE)
    }

    /// Point the client at another Graph root (national clouds, tests)
    pub fn with_base_url(access_token: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Acquire a token as configured and build a client for it
    pub async fn from_config(manager: &ConfigManager, config: &Config) -> Result<Self> {
        let graph_auth = auth::GraphAuth::new(manager.clone(), config.auth.clone());
        let access_token = graph_auth.access_token().await?;

        Ok(Self::with_base_url(access_token, &config.graph_base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request relative to the base URL
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        self.get_raw_url(&url).await
    }

    /// Make a GET request to an absolute URL (for following nextLink)
    async fn get_raw_url<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);

        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let enhanced_error = crate::error::enhance_graph_error(&error_text);
            return Err(Ca2TfError::GraphApiError(format!(
                "HTTP {}: {}",
                status, enhanced_error
            )));
        }

        let data = resp.json::<T>().await?;
        Ok(data)
    }
}

// ============================================================================
// Pagination Helpers
// ============================================================================

/// Generic paginated response from Graph API
///
/// Use this for standard OData paginated responses with `value` array and `@odata.nextLink`
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl GraphClient {
    /// Fetch all pages of a paginated Graph API endpoint
    ///
    /// Follows `@odata.nextLink` until all pages are retrieved. Items keep the
    /// order the service returned them in. Any failing page fails the whole call.
    ///
    /// # Example
    /// ```ignore
    /// let policies: Vec<ConditionalAccessPolicy> =
    ///     client.get_all_pages("identity/conditionalAccess/policies").await?;
    /// ```
    pub async fn get_all_pages<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut page = 0usize;

        loop {
            let response: PaginatedResponse<T> = self.get_raw_url(&current_url).await?;
            page += 1;
            tracing::debug!("Page {} returned {} items", page, response.value.len());
            all_items.extend(response.value);

            match response.next_link {
                Some(next) => current_url = next,
                None => break,
            }
        }

        Ok(all_items)
    }
}
