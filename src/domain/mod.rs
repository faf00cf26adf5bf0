//! Domain types for daybook.
//!
//! This module contains the core data structures:
//! - Entity: the four record kinds and their dispatch table
//! - Insight: the working set of records shown to the user
//! - Notice: non-fatal notifications
//! - Signal: the payload-free refresh counter

pub mod entity;
pub mod insight;
pub mod notice;
pub mod signal;

// Re-export commonly used types
pub use entity::{CalendarEvent, EntityKind, HealthMention, Note, Ordering, Record, Task, UserId};
pub use insight::Insights;
pub use notice::{LogNotifier, Notice, NoticeBoard, NoticeLevel, Notifier};
pub use signal::RefreshSignal;
