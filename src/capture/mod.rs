//! Journal capture.
//!
//! Turns typed text or a live microphone recording into a journal entry and
//! hands it to the extraction service:
//!
//! 1. **Recorder**: owns the microphone for the length of one recording
//! 2. **Coordinator**: record → stop → transcribe → append, and submit
//!
//! # Architecture
//!
//! ```text
//! Microphone → chunks → EncodedAudio → Transcriber → journal text
//!                                                        ↓
//!                                 Extractor ← submit ────┘
//!                                     ↓
//!                               RefreshSignal (+1)
//! ```

pub mod coordinator;
pub mod recorder;

// Re-export key types
pub use coordinator::{
    append_transcript, CaptureCoordinator, CaptureError, CaptureServices, CaptureState,
    TRANSCRIPT_SEPARATOR,
};
pub use recorder::{ActiveRecording, DeviceGuard, EncodedAudio};
