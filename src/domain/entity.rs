//! Record kinds produced by journal extraction.
//!
//! The four kinds form a closed set. Everything that differs between them
//! (remote collection, editable field, list ordering) lives in the table on
//! [`EntityKind`] so the synchronizer can stay generic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the authenticated user owning a record
pub type UserId = String;

/// The closed set of record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    CalendarEvent,
    Note,
    HealthMention,
}

/// How a collection is ordered and truncated when listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    /// Column to sort by
    pub column: &'static str,

    /// Ascending when true, descending otherwise
    pub ascending: bool,

    /// Maximum number of rows to return
    pub limit: Option<usize>,
}

impl EntityKind {
    /// All kinds, in panel order
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Task,
        EntityKind::CalendarEvent,
        EntityKind::Note,
        EntityKind::HealthMention,
    ];

    /// Remote collection holding rows of this kind
    pub fn collection(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::CalendarEvent => "calendar_events",
            Self::Note => "notes",
            Self::HealthMention => "health_mentions",
        }
    }

    /// The single free-text field a user may edit inline
    pub fn text_field(self) -> &'static str {
        match self {
            Self::Task | Self::CalendarEvent => "title",
            Self::Note | Self::HealthMention => "content",
        }
    }

    /// Ordering used when loading the panel for this kind
    pub fn ordering(self) -> Ordering {
        match self {
            Self::Task => Ordering {
                column: "created_at",
                ascending: false,
                limit: None,
            },
            Self::CalendarEvent => Ordering {
                column: "event_date",
                ascending: true,
                limit: None,
            },
            Self::Note | Self::HealthMention => Ordering {
                column: "created_at",
                ascending: false,
                limit: Some(10),
            },
        }
    }

    /// Short tag used on the command line
    pub fn tag(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::CalendarEvent => "event",
            Self::Note => "note",
            Self::HealthMention => "health",
        }
    }

    /// Human-readable label for notices
    pub fn label(self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::CalendarEvent => "Event",
            Self::Note => "Note",
            Self::HealthMention => "Health mention",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "task" | "tasks" => Ok(Self::Task),
            "event" | "events" | "calendar_event" | "calendar_events" => Ok(Self::CalendarEvent),
            "note" | "notes" => Ok(Self::Note),
            "health" | "health_mention" | "health_mentions" => Ok(Self::HealthMention),
            other => Err(format!(
                "unknown record kind '{}' (expected task, event, note or health)",
                other
            )),
        }
    }
}

/// A to-do extracted from a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(rename = "user_id")]
    pub owner: UserId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A dated (or undated) calendar entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "time::deserialize_opt")]
    pub event_time: Option<NaiveTime>,
    #[serde(rename = "user_id")]
    pub owner: UserId,
}

/// A freeform note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "user_id")]
    pub owner: UserId,
}

/// A health or habit mention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMention {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "user_id")]
    pub owner: UserId,
}

/// Common surface the synchronizer needs from every record kind
pub trait Record {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn owner(&self) -> &str;

    /// Current value of the kind's editable text field
    fn text(&self) -> &str;
}

impl Record for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn text(&self) -> &str {
        &self.title
    }
}

impl Record for CalendarEvent {
    const KIND: EntityKind = EntityKind::CalendarEvent;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn text(&self) -> &str {
        &self.title
    }
}

impl Record for Note {
    const KIND: EntityKind = EntityKind::Note;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn text(&self) -> &str {
        &self.content
    }
}

impl Record for HealthMention {
    const KIND: EntityKind = EntityKind::HealthMention;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn text(&self) -> &str {
        &self.content
    }
}

/// Postgres `time` columns come back as `HH:MM:SS`, hand-written rows often as `HH:MM`.
mod time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
