//! The working set of extracted records shown to the user.

use super::entity::{CalendarEvent, EntityKind, HealthMention, Note, Record, Task};

/// All four collections for the current user, as of the last reload.
///
/// Collections are replaced wholesale by the synchronizer; nothing here is
/// ever patched in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insights {
    pub tasks: Vec<Task>,
    pub events: Vec<CalendarEvent>,
    pub notes: Vec<Note>,
    pub health: Vec<HealthMention>,
}

impl Insights {
    /// Number of records of the given kind
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Task => self.tasks.len(),
            EntityKind::CalendarEvent => self.events.len(),
            EntityKind::Note => self.notes.len(),
            EntityKind::HealthMention => self.health.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL.iter().all(|kind| self.count(*kind) == 0)
    }

    /// Ids of the records of the given kind, in display order
    pub fn ids(&self, kind: EntityKind) -> Vec<&str> {
        match kind {
            EntityKind::Task => ids_of(&self.tasks),
            EntityKind::CalendarEvent => ids_of(&self.events),
            EntityKind::Note => ids_of(&self.notes),
            EntityKind::HealthMention => ids_of(&self.health),
        }
    }

    /// Editable text of a record, if it is in the working set
    pub fn text_of(&self, kind: EntityKind, id: &str) -> Option<&str> {
        match kind {
            EntityKind::Task => text_in(&self.tasks, id),
            EntityKind::CalendarEvent => text_in(&self.events, id),
            EntityKind::Note => text_in(&self.notes, id),
            EntityKind::HealthMention => text_in(&self.health, id),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

fn ids_of<R: Record>(records: &[R]) -> Vec<&str> {
    records.iter().map(Record::id).collect()
}

fn text_in<'a, R: Record>(records: &'a [R], id: &str) -> Option<&'a str> {
    records.iter().find(|r| r.id() == id).map(Record::text)
}
