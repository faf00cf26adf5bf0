//! PostgREST-style row store.
//!
//! Every request filters on `user_id`, so a row outside the signed-in
//! user's scope is never read or written.
//!
//! ```text
//! GET    {api_url}/rest/v1/{collection}?select=*&user_id=eq.{owner}&order={col}.{dir}&limit={n}
//! PATCH  {api_url}/rest/v1/{collection}?id=eq.{id}&user_id=eq.{owner}
//! DELETE {api_url}/rest/v1/{collection}?id=eq.{id}&user_id=eq.{owner}
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::{Row, RowStore};
use crate::config::ServiceSettings;
use crate::domain::{EntityKind, Ordering};

/// Row store over the PostgREST HTTP API
pub struct RestStore {
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl RestStore {
    /// Create a store rooted at `base_url` (without the `/rest/v1` suffix)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            access_token: None,
            client,
        })
    }

    /// Create from resolved service settings
    pub fn from_settings(settings: &ServiceSettings) -> Result<Self> {
        let mut store = Self::new(&settings.api_url, settings.timeout())?;
        store.api_key = settings.api_key.clone();
        store.access_token = settings.access_token.clone();
        Ok(store)
    }

    /// Build the collection URL
    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.collection())
    }

    fn request(&self, method: Method, kind: EntityKind) -> RequestBuilder {
        let mut request = self.client.request(method, self.collection_url(kind));
        if let Some(ref key) = self.api_key {
            request = request.header("apikey", key);
        }
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Read a `return=representation` body and count the rows in it
    async fn affected_rows(response: Response, action: &str, kind: EntityKind) -> Result<usize> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Store {} on {} failed ({}): {}",
                action,
                kind.collection(),
                status,
                text.trim()
            );
        }

        let text = response.text().await.unwrap_or_default();
        if text.trim().is_empty() {
            // Server ignored the Prefer header; assume the filter matched.
            return Ok(1);
        }

        let rows: Vec<Row> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {} response for {}", action, kind.collection()))?;
        Ok(rows.len())
    }
}

/// PostgREST `order` query value for an ordering
fn order_param(ordering: &Ordering) -> String {
    let direction = if ordering.ascending { "asc" } else { "desc" };
    format!("{}.{}.nullslast", ordering.column, direction)
}

#[async_trait]
impl RowStore for RestStore {
    #[instrument(skip(self, ordering), fields(collection = kind.collection()))]
    async fn list(&self, kind: EntityKind, owner: &str, ordering: &Ordering) -> Result<Vec<Row>> {
        let mut query = vec![
            ("select".to_string(), "*".to_string()),
            ("user_id".to_string(), format!("eq.{}", owner)),
            ("order".to_string(), order_param(ordering)),
        ];
        if let Some(limit) = ordering.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }

        let response = self
            .request(Method::GET, kind)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", kind.collection()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Fetching {} failed ({}): {}", kind.collection(), status, text.trim());
        }

        let rows: Vec<Row> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} rows", kind.collection()))?;

        debug!(rows = rows.len(), "Fetched collection");
        Ok(rows)
    }

    #[instrument(skip(self, fields), fields(collection = kind.collection()))]
    async fn update(
        &self,
        kind: EntityKind,
        owner: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<usize> {
        let response = self
            .request(Method::PATCH, kind)
            .query(&[("id", format!("eq.{}", id)), ("user_id", format!("eq.{}", owner))])
            .header("Prefer", "return=representation")
            .json(fields)
            .send()
            .await
            .with_context(|| format!("Failed to update {} row", kind.collection()))?;

        Self::affected_rows(response, "update", kind).await
    }

    #[instrument(skip(self), fields(collection = kind.collection()))]
    async fn delete(&self, kind: EntityKind, owner: &str, id: &str) -> Result<usize> {
        let response = self
            .request(Method::DELETE, kind)
            .query(&[("id", format!("eq.{}", id)), ("user_id", format!("eq.{}", owner))])
            .header("Prefer", "return=representation")
            .send()
            .await
            .with_context(|| format!("Failed to delete {} row", kind.collection()))?;

        Self::affected_rows(response, "delete", kind).await
    }
}
