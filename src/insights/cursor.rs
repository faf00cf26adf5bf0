//! The single inline-edit slot.

use crate::domain::EntityKind;

/// Which record is open for editing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditTarget {
    pub kind: EntityKind,
    pub id: String,
}

impl EditTarget {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// An open edit: the target, the text it started from, and the working buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    target: EditTarget,
    original: String,
    buffer: String,
}

impl EditSession {
    pub fn new(target: EditTarget, original: impl Into<String>) -> Self {
        let original = original.into();
        Self {
            target,
            buffer: original.clone(),
            original,
        }
    }

    pub fn target(&self) -> &EditTarget {
        &self.target
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut String {
        &mut self.buffer
    }

    pub fn set_buffer(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    /// True when the buffer differs from the text the edit started with
    pub fn is_dirty(&self) -> bool {
        self.buffer != self.original
    }
}
