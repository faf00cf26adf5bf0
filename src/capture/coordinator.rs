//! Capture coordinator: microphone → audio → transcript → journal text → extraction.
//!
//! Two independent state machines share the journal text buffer:
//!
//! ```text
//! audio:   Idle → Recording → Transcribing → Idle (text appended)
//! submit:  Idle → Submitting → Idle (text cleared | text unchanged on failure)
//! ```
//!
//! State lives behind a short-lived lock that is never held across an await,
//! so the coordinator can be shared (`Arc`) and driven concurrently the way a
//! UI would: a second action started while a remote call is pending sees the
//! in-flight state and is rejected by the guards below.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::recorder::{ActiveRecording, EncodedAudio};
use crate::adapters::{AuthContext, Extractor, Microphone, MicrophoneError, Transcriber};
use crate::domain::{Notice, Notifier, RefreshSignal};

/// Separator placed between existing text and a new transcript
pub const TRANSCRIPT_SEPARATOR: &str = "\n\n";

/// Errors surfaced by the capture coordinator
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Microphone unavailable: {0}")]
    Permission(#[from] MicrophoneError),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Journal entry is empty")]
    Validation,

    #[error("Processing failed: {0}")]
    Extraction(String),

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Busy: {0}")]
    Busy(&'static str),

    #[error("Invalid state: expected {expected:?}, found {found:?}")]
    InvalidState {
        expected: CaptureState,
        found: CaptureState,
    },

    #[error("Recording too large: {size} bytes (limit {limit})")]
    RecordingTooLarge { size: usize, limit: usize },
}

/// Observable audio state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Transcribing,
}

/// Internal audio phase with its owned resources
enum AudioPhase {
    Idle,
    Recording(ActiveRecording),
    Transcribing,
}

impl AudioPhase {
    fn state(&self) -> CaptureState {
        match self {
            Self::Idle => CaptureState::Idle,
            Self::Recording(_) => CaptureState::Recording,
            Self::Transcribing => CaptureState::Transcribing,
        }
    }
}

struct Inner {
    phase: AudioPhase,
    /// Set while `start_capture` is waiting for the device
    acquiring: bool,
    /// Set while a transcription call is pending
    transcribing: bool,
    submitting: bool,
    text: String,
}

/// Collaborators the coordinator talks to
pub struct CaptureServices {
    pub microphone: Arc<dyn Microphone>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn Extractor>,
    pub auth: Arc<dyn AuthContext>,
    pub notifier: Arc<dyn Notifier>,
}

/// Owns the recording/transcription state machine and the journal text
pub struct CaptureCoordinator {
    services: CaptureServices,
    refresh: RefreshSignal,
    max_recording_bytes: Option<usize>,
    inner: Mutex<Inner>,
}

/// Append a transcript to existing journal text
pub fn append_transcript(existing: &str, transcript: &str) -> String {
    if existing.is_empty() {
        transcript.to_string()
    } else {
        format!("{}{}{}", existing, TRANSCRIPT_SEPARATOR, transcript)
    }
}

impl CaptureCoordinator {
    pub fn new(services: CaptureServices, refresh: RefreshSignal) -> Self {
        Self {
            services,
            refresh,
            max_recording_bytes: None,
            inner: Mutex::new(Inner {
                phase: AudioPhase::Idle,
                acquiring: false,
                transcribing: false,
                submitting: false,
                text: String::new(),
            }),
        }
    }

    /// Reject recordings larger than `limit` bytes at stop time
    pub fn with_max_recording_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_recording_bytes = limit;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn surface(&self, err: &CaptureError) {
        self.services.notifier.notify(Notice::error(err.to_string()));
    }

    /// Current audio state
    pub fn state(&self) -> CaptureState {
        self.lock().phase.state()
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().submitting
    }

    /// Current journal text
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Replace the journal text (typing)
    pub fn set_text(&self, text: impl Into<String>) {
        self.lock().text = text.into();
    }

    /// Whether submit would be accepted right now
    pub fn can_submit(&self) -> bool {
        let inner = self.lock();
        matches!(inner.phase, AudioPhase::Idle)
            && !inner.acquiring
            && !inner.submitting
            && !inner.text.trim().is_empty()
    }

    /// The refresh signal bumped after each successful submission
    pub fn refresh_signal(&self) -> &RefreshSignal {
        &self.refresh
    }

    /// Acquire the microphone and start buffering audio
    #[instrument(skip(self))]
    pub async fn start_capture(&self) -> Result<(), CaptureError> {
        {
            let mut inner = self.lock();
            if inner.acquiring || !matches!(inner.phase, AudioPhase::Idle) {
                let err = CaptureError::Busy("a recording is already in progress");
                warn!(error = %err, "Start capture rejected");
                return Err(err);
            }
            inner.acquiring = true;
        }

        let acquired = self.services.microphone.acquire().await;

        let mut inner = self.lock();
        inner.acquiring = false;
        match acquired {
            Ok(input) => {
                inner.phase = AudioPhase::Recording(ActiveRecording::new(input));
                info!("Recording started");
                Ok(())
            }
            Err(e) => {
                drop(inner);
                let err = CaptureError::Permission(e);
                warn!(error = %err, "Microphone unavailable");
                self.surface(&err);
                Err(err)
            }
        }
    }

    /// Finalize the recording and release the microphone.
    ///
    /// On success the coordinator is `Transcribing` and the caller must hand
    /// the audio to [`CaptureCoordinator::transcribe`].
    #[instrument(skip(self))]
    pub async fn stop_capture(&self) -> Result<EncodedAudio, CaptureError> {
        let recording = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.phase, AudioPhase::Transcribing) {
                AudioPhase::Recording(recording) => recording,
                other => {
                    let found = other.state();
                    inner.phase = other;
                    return Err(CaptureError::InvalidState {
                        expected: CaptureState::Recording,
                        found,
                    });
                }
            }
        };

        let audio = recording.finish().await;
        info!(audio = %audio.fingerprint(), bytes = audio.len(), "Recording stopped");

        if let Some(limit) = self.max_recording_bytes {
            if audio.len() > limit {
                self.lock().phase = AudioPhase::Idle;
                let err = CaptureError::RecordingTooLarge {
                    size: audio.len(),
                    limit,
                };
                warn!(error = %err, "Recording discarded");
                self.surface(&err);
                return Err(err);
            }
        }

        Ok(audio)
    }

    /// Send finished audio to the transcription service and append the result.
    ///
    /// Valid only while `Transcribing` and no other call is pending. Always
    /// returns to `Idle`, also when the returned future is dropped; on
    /// failure the journal text is left untouched. Returns the full journal
    /// text.
    #[instrument(skip(self, audio), fields(audio = %audio.fingerprint()))]
    pub async fn transcribe(&self, audio: EncodedAudio) -> Result<String, CaptureError> {
        {
            let mut inner = self.lock();
            let found = inner.phase.state();
            if found != CaptureState::Transcribing {
                return Err(CaptureError::InvalidState {
                    expected: CaptureState::Transcribing,
                    found,
                });
            }
            if inner.transcribing {
                return Err(CaptureError::Busy("a transcription is already in flight"));
            }
            inner.transcribing = true;
        }
        let pending = PendingTranscription { coordinator: self };

        let result = self.services.transcriber.transcribe(&audio).await;
        drop(pending);

        let mut inner = self.lock();
        match result {
            Ok(transcript) => {
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    debug!("Transcript empty, journal text unchanged");
                } else {
                    inner.text = append_transcript(&inner.text, transcript);
                    info!(chars = transcript.len(), "Transcript appended");
                }
                Ok(inner.text.clone())
            }
            Err(e) => {
                drop(inner);
                let err = CaptureError::Transcription(format!("{:#}", e));
                error!(error = %err, "Transcription failed");
                self.surface(&err);
                Err(err)
            }
        }
    }

    /// Stop recording and transcribe in one step
    pub async fn stop_and_transcribe(&self) -> Result<String, CaptureError> {
        let audio = self.stop_capture().await?;
        self.transcribe(audio).await
    }

    /// Send the journal text to the extraction service.
    ///
    /// Empty text never leaves the process. On success the text is cleared
    /// and the refresh signal bumped; on failure the text is kept verbatim so
    /// the user can resubmit.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> Result<(), CaptureError> {
        let text = {
            let mut inner = self.lock();
            if inner.submitting {
                return Err(CaptureError::Busy("a submission is already in flight"));
            }
            if inner.acquiring || !matches!(inner.phase, AudioPhase::Idle) {
                return Err(CaptureError::Busy("recording or transcription in progress"));
            }
            if inner.text.trim().is_empty() {
                drop(inner);
                let err = CaptureError::Validation;
                self.surface(&err);
                return Err(err);
            }
            inner.submitting = true;
            inner.text.clone()
        };

        let entry_id = Uuid::new_v4();

        let Some(user_id) = self.services.auth.current_user() else {
            self.lock().submitting = false;
            let err = CaptureError::Unauthenticated;
            warn!(%entry_id, "Submit without a signed-in user");
            self.surface(&err);
            return Err(err);
        };

        info!(%entry_id, chars = text.len(), "Submitting journal entry");
        let result = self.services.extractor.extract(&text, &user_id).await;

        let mut inner = self.lock();
        inner.submitting = false;
        match result {
            Ok(()) => {
                inner.text.clear();
                drop(inner);
                let generation = self.refresh.bump();
                info!(%entry_id, generation, "Journal entry processed");
                self.services
                    .notifier
                    .notify(Notice::success("Journal entry processed"));
                Ok(())
            }
            Err(e) => {
                drop(inner);
                let err = CaptureError::Extraction(format!("{:#}", e));
                error!(%entry_id, error = %err, "Journal processing failed");
                self.surface(&err);
                Err(err)
            }
        }
    }

    /// Drop any in-progress recording and release the microphone.
    ///
    /// Also leaves a `Transcribing` phase whose audio was never handed to
    /// [`CaptureCoordinator::transcribe`]. A pending transcription call is
    /// left to finish on its own.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        match std::mem::replace(&mut inner.phase, AudioPhase::Idle) {
            AudioPhase::Recording(recording) => {
                recording.abandon();
                info!("Recording abandoned on teardown");
            }
            AudioPhase::Transcribing if inner.transcribing => {
                inner.phase = AudioPhase::Transcribing;
            }
            AudioPhase::Transcribing => info!("Untranscribed audio discarded on teardown"),
            AudioPhase::Idle => {}
        }
    }
}

/// Returns the coordinator to `Idle` when a transcription call ends,
/// however it ends
struct PendingTranscription<'a> {
    coordinator: &'a CaptureCoordinator,
}

impl Drop for PendingTranscription<'_> {
    fn drop(&mut self) {
        let mut inner = self.coordinator.lock();
        inner.transcribing = false;
        inner.phase = AudioPhase::Idle;
    }
}

impl Drop for CaptureCoordinator {
    fn drop(&mut self) {
        self.teardown();
    }
}
