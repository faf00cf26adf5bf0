//! Microphone access.
//!
//! A [`Microphone`] hands out an [`AudioInput`]: a channel of encoded audio
//! chunks in arrival order plus a [`DeviceHandle`] that must be released
//! when recording ends. The default implementation runs an external
//! recorder (`arecord`, `rec`, ...) and streams its stdout.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_CHUNK_BYTES: usize = 16 * 1024;

/// Errors raised when acquiring the microphone
#[derive(Debug, Error)]
pub enum MicrophoneError {
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("No microphone available: {0}")]
    NoDevice(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An open capture device
#[async_trait]
pub trait DeviceHandle: Send {
    /// Stop producing audio and flush chunks still in flight
    async fn finish(&mut self) {}

    /// Release the device. The owner calls this exactly once.
    fn release(&mut self);
}

/// An acquired microphone stream
pub struct AudioInput {
    /// Encoded chunks, in arrival order
    pub chunks: mpsc::UnboundedReceiver<Vec<u8>>,

    /// Handle to the open device
    pub handle: Box<dyn DeviceHandle>,

    /// MIME type of the concatenated chunks
    pub mime_type: String,
}

/// Source of microphone streams
#[async_trait]
pub trait Microphone: Send + Sync {
    async fn acquire(&self) -> Result<AudioInput, MicrophoneError>;
}

/// Microphone backed by an external recorder process writing to stdout
#[derive(Debug, Clone)]
pub struct CommandMicrophone {
    program: String,
    args: Vec<String>,
    mime_type: String,
    startup_grace: Duration,
}

impl Default for CommandMicrophone {
    fn default() -> Self {
        Self::new(
            "arecord",
            ["-q", "-f", "S16_LE", "-r", "16000", "-c", "1", "-t", "wav", "-"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl CommandMicrophone {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            mime_type: "audio/wav".to_string(),
            startup_grace: Duration::from_millis(250),
        }
    }

    /// Parse a shell-style command line (whitespace separated, no quoting)
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Microphone for CommandMicrophone {
    async fn acquire(&self) -> Result<AudioInput, MicrophoneError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    MicrophoneError::NoDevice(format!("recorder '{}' not found", self.program))
                }
                ErrorKind::PermissionDenied => MicrophoneError::PermissionDenied(e.to_string()),
                _ => MicrophoneError::Io(e),
            })?;

        // A recorder that cannot open the device exits right away.
        let early_exit = tokio::time::timeout(self.startup_grace, child.wait()).await;
        if let Ok(status) = early_exit {
            let status = status?;
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            let detail = if stderr.trim().is_empty() {
                format!("recorder exited with {}", status)
            } else {
                stderr.trim().to_string()
            };
            let lowered = detail.to_ascii_lowercase();
            return Err(if lowered.contains("denied") || lowered.contains("permission") {
                MicrophoneError::PermissionDenied(detail)
            } else {
                MicrophoneError::NoDevice(detail)
            });
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MicrophoneError::NoDevice("recorder has no stdout".to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Recorder stream read failed");
                        break;
                    }
                }
            }
        });

        debug!(program = %self.program, "Recorder started");

        Ok(AudioInput {
            chunks: rx,
            handle: Box::new(RecorderProcess {
                child: Some(child),
                reader: Some(reader),
            }),
            mime_type: self.mime_type.clone(),
        })
    }
}

/// A running recorder process and the task reading its output
struct RecorderProcess {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl DeviceHandle for RecorderProcess {
    async fn finish(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        debug!("Recorder released");
    }
}
