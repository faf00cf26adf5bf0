//! Insight synchronization.
//!
//! Displays, edits and deletes the records extracted from journal entries.
//! The synchronizer never creates records; it reads them for the signed-in
//! user and re-reads everything after each change.

pub mod cursor;
pub mod synchronizer;

pub use cursor::{EditSession, EditTarget};
pub use synchronizer::{InsightSynchronizer, LoadReport, SyncError};
