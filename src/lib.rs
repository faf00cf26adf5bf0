//! daybook - narrate a day, get structured records back
//!
//! Turns a typed or spoken journal entry into tasks, calendar events, notes
//! and health mentions (via an external extraction service), and keeps a
//! local view of those records in sync with the remote store.
//!
//! # Architecture
//!
//! Two components, coupled only by a refresh counter:
//! - The capture coordinator records, transcribes and submits entries
//! - The insight synchronizer loads, edits, toggles and deletes records,
//!   reloading everything whenever the counter moves
//!
//! # Modules
//!
//! - `adapters`: External collaborators (transcription, extraction, store, auth, microphone)
//! - `capture`: Recording/transcription state machine and submission
//! - `insights`: Working set, edit cursor and store mutations
//! - `domain`: Record kinds, notices, refresh signal
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Submit a typed entry
//! daybook submit "Buy milk and call mom"
//!
//! # Record, transcribe and submit
//! daybook record --submit
//!
//! # Review and edit extracted records
//! daybook insights
//! daybook toggle <task-id>
//! daybook edit note <note-id> "Slept 8 hours"
//! ```

pub mod adapters;
pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod insights;

// Re-export main types at crate root for convenience
pub use capture::{CaptureCoordinator, CaptureError, CaptureServices, CaptureState, EncodedAudio};
pub use domain::{EntityKind, Insights, Notice, NoticeBoard, RefreshSignal};
pub use insights::{EditSession, EditTarget, InsightSynchronizer, LoadReport, SyncError};
