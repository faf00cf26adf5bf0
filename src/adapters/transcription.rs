//! Speech-to-text backends.
//!
//! Two modes:
//! - HTTP: posts base64 audio to a transcription function and reads `{ text }`
//! - Whisper CLI: shells out to a local whisper binary

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::Transcriber;
use crate::capture::EncodedAudio;
use crate::config::ServiceSettings;

/// Request body for the transcription function
#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    audio: &'a str,
}

/// Response body from the transcription function
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Transcription over HTTP
pub struct HttpTranscriber {
    endpoint: String,
    api_key: Option<String>,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl HttpTranscriber {
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
        let mut transcriber = Self::new(settings.transcribe_url(), settings.timeout())?;
        transcriber.api_key = settings.api_key.clone();
        transcriber.access_token = settings.access_token.clone();
        Ok(transcriber)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, audio), fields(audio = %audio.fingerprint(), bytes = audio.len()))]
    async fn transcribe(&self, audio: &EncodedAudio) -> Result<String> {
        let encoded = STANDARD.encode(audio.bytes());
        debug!(encoded_len = encoded.len(), "Sending audio for transcription");

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&TranscribeRequest { audio: &encoded });

        if let Some(ref key) = self.api_key {
            request = request.header("apikey", key);
        }
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach transcription service")?;

        let status = response.status();
        let body: TranscribeResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse transcription response ({})", status))?;

        if let Some(error) = body.error {
            anyhow::bail!("Transcription service error ({}): {}", status, error);
        }
        if !status.is_success() {
            anyhow::bail!("Transcription service returned {}", status);
        }

        body.text
            .map(|t| t.trim().to_string())
            .context("Transcription response has no text")
    }
}

/// Whisper output JSON structure
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
}

/// Transcription through a local whisper binary
pub struct WhisperCliTranscriber {
    binary_path: String,
    model: String,
}

impl WhisperCliTranscriber {
    /// Use `WHISPER_PATH` if set, otherwise `whisper` on the PATH
    pub fn new(model: impl Into<String>) -> Self {
        let binary_path = std::env::var("WHISPER_PATH").unwrap_or_else(|_| "whisper".to_string());
        Self {
            binary_path,
            model: model.into(),
        }
    }

    pub fn with_binary_path(binary_path: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    #[instrument(skip(self, audio), fields(audio = %audio.fingerprint(), model = %self.model))]
    async fn transcribe(&self, audio: &EncodedAudio) -> Result<String> {
        let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let stem = audio.fingerprint();
        let audio_path = temp_dir
            .path()
            .join(format!("{}.{}", stem, audio.file_extension()));

        tokio::fs::write(&audio_path, audio.bytes())
            .await
            .context("Failed to write audio for whisper")?;

        let output = Command::new(&self.binary_path)
            .arg(&audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_dir")
            .arg(temp_dir.path())
            .arg("--output_format")
            .arg("json")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Whisper failed: {}", stderr.trim());
        }

        let json_path = temp_dir.path().join(format!("{}.json", stem));
        let json_content = tokio::fs::read_to_string(&json_path)
            .await
            .context("Failed to read whisper output")?;

        let whisper: WhisperOutput =
            serde_json::from_str(&json_content).context("Failed to parse whisper JSON")?;

        Ok(whisper.text.trim().to_string())
    }
}
