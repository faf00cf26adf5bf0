//! Extraction service client.
//!
//! Endpoint: POST {api_url}/functions/v1/process-journal
//! Auth: apikey header + bearer token

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::Extractor;
use crate::config::ServiceSettings;

/// Payload for the extraction function
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessJournalRequest<'a> {
    journal_content: &'a str,
    user_id: &'a str,
}

/// Response from the extraction function
#[derive(Debug, Default, Deserialize)]
struct ProcessJournalResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Extraction over HTTP
pub struct HttpExtractor {
    endpoint: String,
    api_key: Option<String>,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl HttpExtractor {
    /// Create a new client for the given endpoint
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: None,
            access_token: None,
            client,
        })
    }

    /// Create from resolved service settings
    pub fn from_settings(settings: &ServiceSettings) -> Result<Self> {
        let mut extractor = Self::new(settings.extract_url(), settings.timeout())?;
        extractor.api_key = settings.api_key.clone();
        extractor.access_token = settings.access_token.clone();
        Ok(extractor)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    #[instrument(skip(self, journal_content), fields(chars = journal_content.len()))]
    async fn extract(&self, journal_content: &str, user_id: &str) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(&ProcessJournalRequest {
            journal_content,
            user_id,
        });

        if let Some(ref key) = self.api_key {
            request = request.header("apikey", key);
        }
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach extraction service")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(%status, "Extraction service responded");

        // Body may be empty on 204; treat that as success.
        let body: ProcessJournalResponse = if text.trim().is_empty() {
            ProcessJournalResponse::default()
        } else {
            serde_json::from_str(&text).unwrap_or_default()
        };

        if !status.is_success() {
            let detail = body.error.unwrap_or(text);
            anyhow::bail!("Extraction service error ({}): {}", status, detail.trim());
        }
        if let Some(error) = body.error {
            anyhow::bail!("Extraction service error: {}", error);
        }
        if body.success == Some(false) {
            anyhow::bail!("Extraction service reported failure");
        }

        Ok(())
    }
}
