//! Adapter interfaces for external systems.
//!
//! The capture and sync components are pure clients of these collaborators:
//! a transcription service, an extraction service, a row store, an
//! authentication context and a microphone. Each has a trait here and one or
//! more concrete implementations in the submodules.

pub mod auth;
pub mod extraction;
pub mod microphone;
pub mod store;
pub mod transcription;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::capture::EncodedAudio;
use crate::domain::{EntityKind, Ordering, UserId};

pub use auth::StaticAuth;
pub use extraction::HttpExtractor;
pub use microphone::{AudioInput, CommandMicrophone, DeviceHandle, Microphone, MicrophoneError};
pub use store::RestStore;
pub use transcription::{HttpTranscriber, WhisperCliTranscriber};

/// A raw row as returned by the store
pub type Row = Value;

/// Converts encoded audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Transcribe one completed recording
    async fn transcribe(&self, audio: &EncodedAudio) -> Result<String>;
}

/// Turns journal text into records across the four collections
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Process one journal entry for the given user.
    ///
    /// Records are created remotely as a side effect; nothing is returned.
    async fn extract(&self, journal_content: &str, user_id: &str) -> Result<()>;
}

/// Uniform row CRUD over the four collections, always scoped by owner
#[async_trait]
pub trait RowStore: Send + Sync {
    /// List the owner's rows of a kind in the given order
    async fn list(&self, kind: EntityKind, owner: &str, ordering: &Ordering) -> Result<Vec<Row>>;

    /// Update fields of one row, returning the number of rows affected
    async fn update(
        &self,
        kind: EntityKind,
        owner: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<usize>;

    /// Delete one row, returning the number of rows affected
    async fn delete(&self, kind: EntityKind, owner: &str, id: &str) -> Result<usize>;
}

/// Source of the authenticated user
pub trait AuthContext: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}
