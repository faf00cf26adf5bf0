//! Configuration for daybook.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DAYBOOK_API_URL, DAYBOOK_API_KEY,
//!    DAYBOOK_ACCESS_TOKEN, DAYBOOK_USER_ID)
//! 2. Config file (.daybook/config.yaml)
//! 3. Defaults (local API, no user)
//!
//! Config file discovery:
//! - Searches current directory and parents for .daybook/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_API_URL: &str = "http://localhost:54321";
const DEFAULT_TRANSCRIBE_PATH: &str = "/functions/v1/transcribe-audio";
const DEFAULT_EXTRACT_PATH: &str = "/functions/v1/process-journal";
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_RECORDER: &str = "arecord -q -f S16_LE -r 16000 -c 1 -t wav -";
const DEFAULT_WHISPER_MODEL: &str = "base";
// Matches the upload cap of common hosted speech-to-text APIs.
const DEFAULT_MAX_RECORDING_BYTES: usize = 25 * 1024 * 1024;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the backend (store + functions)
    pub api_url: Option<String>,
    /// Public API key sent as `apikey`
    pub api_key: Option<String>,
    /// Path of the transcription function
    pub transcribe_path: Option<String>,
    /// Path of the extraction function
    pub extract_path: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub user_id: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureConfig {
    /// Recorder command line writing encoded audio to stdout
    pub recorder: Option<String>,
    /// MIME type of the recorder output
    pub mime_type: Option<String>,
    /// Transcription backend
    pub transcriber: Option<TranscriberBackend>,
    /// Whisper model (whisper backend only)
    pub whisper_model: Option<String>,
    /// Reject recordings larger than this; 0 disables the cap
    pub max_recording_bytes: Option<usize>,
}

/// Which transcription backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriberBackend {
    #[default]
    Http,
    Whisper,
}

/// Resolved settings for the HTTP collaborators
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub transcribe_path: String,
    pub extract_path: String,
    pub timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            access_token: None,
            transcribe_path: DEFAULT_TRANSCRIBE_PATH.to_string(),
            extract_path: DEFAULT_EXTRACT_PATH.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl ServiceSettings {
    pub fn transcribe_url(&self) -> String {
        join_url(&self.api_url, &self.transcribe_path)
    }

    pub fn extract_url(&self) -> String {
        join_url(&self.api_url, &self.extract_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Resolved capture settings
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub recorder: String,
    pub mime_type: String,
    pub transcriber: TranscriberBackend,
    pub whisper_model: String,
    pub max_recording_bytes: Option<usize>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            recorder: DEFAULT_RECORDER.to_string(),
            mime_type: "audio/wav".to_string(),
            transcriber: TranscriberBackend::Http,
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            max_recording_bytes: Some(DEFAULT_MAX_RECORDING_BYTES),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Backend endpoints and credentials
    pub service: ServiceSettings,
    /// Signed-in user, if configured
    pub user_id: Option<String>,
    /// Capture settings
    pub capture: CaptureSettings,
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".daybook").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge a parsed config file (if any) with environment overrides
fn resolve(
    config: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_file, file) = match config {
        Some((path, file)) => (Some(path), Some(file)),
        None => (None, None),
    };

    let service_file = file.as_ref().map(|f| f.service.clone()).unwrap_or_default();
    let auth_file = file.as_ref().map(|f| f.auth.clone()).unwrap_or_default();
    let capture_file = file.as_ref().map(|f| f.capture.clone()).unwrap_or_default();

    let defaults = ServiceSettings::default();
    let service = ServiceSettings {
        api_url: env("DAYBOOK_API_URL")
            .or(service_file.api_url)
            .unwrap_or(defaults.api_url),
        api_key: env("DAYBOOK_API_KEY").or(service_file.api_key),
        access_token: env("DAYBOOK_ACCESS_TOKEN").or(auth_file.access_token),
        transcribe_path: service_file
            .transcribe_path
            .unwrap_or(defaults.transcribe_path),
        extract_path: service_file.extract_path.unwrap_or(defaults.extract_path),
        timeout_seconds: service_file
            .timeout_seconds
            .unwrap_or(defaults.timeout_seconds),
    };

    let capture_defaults = CaptureSettings::default();
    let capture = CaptureSettings {
        recorder: capture_file.recorder.unwrap_or(capture_defaults.recorder),
        mime_type: capture_file.mime_type.unwrap_or(capture_defaults.mime_type),
        transcriber: capture_file
            .transcriber
            .unwrap_or(capture_defaults.transcriber),
        whisper_model: capture_file
            .whisper_model
            .unwrap_or(capture_defaults.whisper_model),
        max_recording_bytes: match capture_file.max_recording_bytes {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => capture_defaults.max_recording_bytes,
        },
    };

    ResolvedConfig {
        config_file,
        service,
        user_id: env("DAYBOOK_USER_ID").or(auth_file.user_id),
        capture,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let config = match find_config_file(&cwd) {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    Ok(resolve(
        config,
        |key| std::env::var(key).ok().filter(|v| !v.is_empty()),
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, no_env);

        assert!(config.config_file.is_none());
        assert_eq!(
            config.service.extract_url(),
            "http://localhost:54321/functions/v1/process-journal"
        );
        assert_eq!(config.service.timeout(), Duration::from_secs(60));
        assert_eq!(config.capture.transcriber, TranscriberBackend::Http);
        assert_eq!(config.capture.max_recording_bytes, Some(25 * 1024 * 1024));
        assert!(config.user_id.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let daybook_dir = temp.path().join(".daybook");
        std::fs::create_dir_all(&daybook_dir).unwrap();

        let config_path = daybook_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
service:
  api_url: https://abc.example.co/
  api_key: anon-key
  timeout_seconds: 15
auth:
  user_id: user-42
capture:
  transcriber: whisper
  whisper_model: small
  max_recording_bytes: 0
"#
        )
        .unwrap();

        let found = find_config_file(&temp.path().join("nested/dir")).unwrap();
        assert_eq!(found, config_path);

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, "1.0");

        let config = resolve(Some((config_path.clone(), parsed)), no_env);
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(
            config.service.transcribe_url(),
            "https://abc.example.co/functions/v1/transcribe-audio"
        );
        assert_eq!(config.service.api_key.as_deref(), Some("anon-key"));
        assert_eq!(config.service.timeout_seconds, 15);
        assert_eq!(config.user_id.as_deref(), Some("user-42"));
        assert_eq!(config.capture.transcriber, TranscriberBackend::Whisper);
        assert_eq!(config.capture.whisper_model, "small");
        assert_eq!(config.capture.max_recording_bytes, None);
    }

    #[test]
    fn test_env_overrides_file() {
        let file: ConfigFile = serde_yaml::from_str(
            r#"
version: "1.0"
service:
  api_url: https://from-file.example
auth:
  user_id: file-user
"#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("DAYBOOK_API_URL", "https://from-env.example"),
            ("DAYBOOK_USER_ID", "env-user"),
        ]
        .into_iter()
        .collect();

        let config = resolve(
            Some((PathBuf::from("/p/.daybook/config.yaml"), file)),
            |key| env.get(key).map(|v| v.to_string()),
        );

        assert_eq!(config.service.api_url, "https://from-env.example");
        assert_eq!(config.user_id.as_deref(), Some("env-user"));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.co/", "/x/y"), "https://a.co/x/y");
        assert_eq!(join_url("https://a.co", "x"), "https://a.co/x");
        assert_eq!(
            join_url("https://a.co", "https://other.co/fn"),
            "https://other.co/fn"
        );
    }
}
