//! Insight synchronizer.
//!
//! Keeps the four record collections for the signed-in user and applies
//! toggle / edit / delete against the row store. Every successful mutation
//! is followed by a full reload; nothing is patched locally, so the working
//! set is always a confirmed copy of the store.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::cursor::{EditSession, EditTarget};
use crate::adapters::{AuthContext, RowStore};
use crate::domain::{
    CalendarEvent, EntityKind, HealthMention, Insights, Note, Notice, Notifier, Record, Task,
    UserId,
};

/// Errors raised against the row store
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to load {kind} records: {message}")]
    Fetch { kind: EntityKind, message: String },

    #[error("Failed to update {kind} {id}: {message}")]
    Update {
        kind: EntityKind,
        id: String,
        message: String,
    },

    #[error("Failed to delete {kind} {id}: {message}")]
    Delete {
        kind: EntityKind,
        id: String,
        message: String,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("No record is being edited")]
    NoActiveEdit,

    #[error("Not signed in")]
    Unauthenticated,
}

/// Outcome of one reload
#[derive(Debug, Default)]
pub struct LoadReport {
    /// No user was signed in; nothing was fetched
    pub skipped: bool,

    /// Collections replaced with fresh data
    pub refreshed: Vec<EntityKind>,

    /// Collections left at their previous value
    pub failures: Vec<SyncError>,
}

impl LoadReport {
    /// Every collection reflects the store
    pub fn is_consistent(&self) -> bool {
        !self.skipped && self.failures.is_empty()
    }
}

/// Maintains the insight working set and the edit cursor
pub struct InsightSynchronizer {
    store: Arc<dyn RowStore>,
    auth: Arc<dyn AuthContext>,
    notifier: Arc<dyn Notifier>,
    refresh: Option<watch::Receiver<u64>>,
    /// Last refresh generation acted on
    seen_generation: u64,
    insights: Insights,
    cursor: Option<EditSession>,
    reloads: u64,
}

impl InsightSynchronizer {
    pub fn new(
        store: Arc<dyn RowStore>,
        auth: Arc<dyn AuthContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            auth,
            notifier,
            refresh: None,
            seen_generation: 0,
            insights: Insights::default(),
            cursor: None,
            reloads: 0,
        }
    }

    /// Observe a refresh signal; each new value triggers a reload
    pub fn with_refresh(mut self, mut refresh: watch::Receiver<u64>) -> Self {
        self.seen_generation = *refresh.borrow_and_update();
        self.refresh = Some(refresh);
        self
    }

    /// Current working set
    pub fn insights(&self) -> &Insights {
        &self.insights
    }

    /// The open edit, if any
    pub fn cursor(&self) -> Option<&EditSession> {
        self.cursor.as_ref()
    }

    /// Number of reloads that reached the store
    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    fn surface(&self, err: &SyncError) {
        self.notifier.notify(Notice::error(err.to_string()));
    }

    fn require_user(&self) -> Result<UserId, SyncError> {
        match self.auth.current_user() {
            Some(user) => Ok(user),
            None => {
                let err = SyncError::Unauthenticated;
                self.surface(&err);
                Err(err)
            }
        }
    }

    /// Fetch all four collections for the signed-in user.
    ///
    /// Collections are fetched concurrently and applied independently: one
    /// that fails keeps its previous contents and is reported, the others
    /// are still replaced. Without a signed-in user nothing happens.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> LoadReport {
        let Some(user) = self.auth.current_user() else {
            debug!("No signed-in user, skipping load");
            return LoadReport {
                skipped: true,
                ..Default::default()
            };
        };

        let (tasks, events, notes, health) = tokio::join!(
            fetch::<Task>(self.store.as_ref(), &user),
            fetch::<CalendarEvent>(self.store.as_ref(), &user),
            fetch::<Note>(self.store.as_ref(), &user),
            fetch::<HealthMention>(self.store.as_ref(), &user),
        );

        let mut report = LoadReport::default();
        apply(&mut self.insights.tasks, tasks, &mut report);
        apply(&mut self.insights.events, events, &mut report);
        apply(&mut self.insights.notes, notes, &mut report);
        apply(&mut self.insights.health, health, &mut report);

        for failure in &report.failures {
            warn!(error = %failure, "Collection kept at previous value");
            self.surface(failure);
        }

        self.reloads += 1;
        info!(
            reload = self.reloads,
            tasks = self.insights.tasks.len(),
            events = self.insights.events.len(),
            notes = self.insights.notes.len(),
            health = self.insights.health.len(),
            "Insights loaded"
        );
        report
    }

    /// Reload if the refresh signal moved since it was last seen.
    ///
    /// A bump sent just before the signal's sender went away still counts.
    pub async fn sync_if_signalled(&mut self) -> Option<LoadReport> {
        let rx = self.refresh.as_mut()?;
        let changed = match rx.has_changed() {
            Ok(changed) => changed,
            // Sender gone: compare against the last generation acted on.
            Err(_) => *rx.borrow() != self.seen_generation,
        };
        if !changed {
            return None;
        }

        let generation = *rx.borrow_and_update();
        self.seen_generation = generation;
        debug!(generation, "Refresh signalled");
        Some(self.load().await)
    }

    /// Wait for the next refresh signal, then reload.
    ///
    /// Returns `None` once the signal's sender is gone (or none was attached).
    pub async fn wait_for_refresh(&mut self) -> Option<LoadReport> {
        let rx = self.refresh.as_mut()?;
        rx.changed().await.ok()?;
        let generation = *rx.borrow_and_update();
        self.seen_generation = generation;
        debug!(generation, "Refresh signalled");
        Some(self.load().await)
    }

    /// Flip a task's completed flag, then reload. Returns the new value.
    #[instrument(skip(self))]
    pub async fn toggle_task(&mut self, id: &str) -> Result<bool, SyncError> {
        let user = self.require_user()?;

        let Some(task) = self.insights.task(id) else {
            let err = SyncError::NotFound {
                kind: EntityKind::Task,
                id: id.to_string(),
            };
            self.surface(&err);
            return Err(err);
        };
        let completed = !task.completed;

        let mut fields = Map::new();
        fields.insert("completed".to_string(), Value::Bool(completed));
        self.write(EntityKind::Task, &user, id, &fields).await?;

        info!(id, completed, "Task toggled");
        self.load().await;
        Ok(completed)
    }

    /// Open a record for editing, seeding the buffer with its current text.
    ///
    /// Replaces any open edit without saving it; the abandoned session is
    /// returned so the caller can tell whether unsaved text was dropped.
    pub fn begin_edit(
        &mut self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<EditSession>, SyncError> {
        let Some(text) = self.insights.text_of(kind, id) else {
            let err = SyncError::NotFound {
                kind,
                id: id.to_string(),
            };
            self.surface(&err);
            return Err(err);
        };

        let session = EditSession::new(EditTarget::new(kind, id), text);
        let previous = self.cursor.replace(session);

        if let Some(ref abandoned) = previous {
            if abandoned.is_dirty() {
                warn!(
                    kind = %abandoned.target().kind,
                    id = %abandoned.target().id,
                    "Unsaved edit discarded"
                );
            }
        }
        debug!(%kind, id, "Edit started");
        Ok(previous)
    }

    /// Mutable access to the open edit buffer
    pub fn edit_buffer_mut(&mut self) -> Option<&mut String> {
        self.cursor.as_mut().map(EditSession::buffer_mut)
    }

    /// Replace the open edit buffer
    pub fn set_edit_buffer(&mut self, text: impl Into<String>) -> Result<(), SyncError> {
        match self.cursor.as_mut() {
            Some(session) => {
                session.set_buffer(text);
                Ok(())
            }
            None => Err(SyncError::NoActiveEdit),
        }
    }

    /// Write the edit buffer to the record's text field.
    ///
    /// On success the cursor is cleared and everything reloads; on failure
    /// the cursor and buffer stay so the save can be retried.
    #[instrument(skip(self))]
    pub async fn save_edit(&mut self) -> Result<(), SyncError> {
        let Some(session) = self.cursor.as_ref() else {
            let err = SyncError::NoActiveEdit;
            self.surface(&err);
            return Err(err);
        };
        let target = session.target().clone();

        let mut fields = Map::new();
        fields.insert(
            target.kind.text_field().to_string(),
            Value::String(session.buffer().to_string()),
        );

        let user = self.require_user()?;
        self.write(target.kind, &user, &target.id, &fields).await?;

        self.cursor = None;
        info!(kind = %target.kind, id = %target.id, "Edit saved");
        self.notifier
            .notify(Notice::success(format!("{} updated", target.kind.label())));
        self.load().await;
        Ok(())
    }

    /// Close the open edit without writing anything
    pub fn cancel_edit(&mut self) -> Option<EditSession> {
        let cancelled = self.cursor.take();
        if let Some(ref session) = cancelled {
            debug!(kind = %session.target().kind, id = %session.target().id, "Edit cancelled");
        }
        cancelled
    }

    /// Delete a record, then reload
    #[instrument(skip(self))]
    pub async fn delete(&mut self, kind: EntityKind, id: &str) -> Result<(), SyncError> {
        let user = self.require_user()?;

        let affected = match self.store.delete(kind, &user, id).await {
            Ok(affected) => affected,
            Err(e) => {
                let err = SyncError::Delete {
                    kind,
                    id: id.to_string(),
                    message: format!("{:#}", e),
                };
                self.surface(&err);
                return Err(err);
            }
        };
        if affected == 0 {
            let err = SyncError::NotFound {
                kind,
                id: id.to_string(),
            };
            self.surface(&err);
            return Err(err);
        }

        // An edit of a record that no longer exists can never be saved.
        if self
            .cursor
            .as_ref()
            .is_some_and(|s| s.target().kind == kind && s.target().id == id)
        {
            self.cursor = None;
        }

        info!(%kind, id, "Record deleted");
        self.notifier
            .notify(Notice::success(format!("{} deleted", kind.label())));
        self.load().await;
        Ok(())
    }

    /// Update one row, mapping store failures and zero-row writes to errors
    async fn write(
        &self,
        kind: EntityKind,
        user: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SyncError> {
        let err = match self.store.update(kind, user, id, fields).await {
            Ok(0) => SyncError::NotFound {
                kind,
                id: id.to_string(),
            },
            Ok(_) => return Ok(()),
            Err(e) => SyncError::Update {
                kind,
                id: id.to_string(),
                message: format!("{:#}", e),
            },
        };
        warn!(error = %err, "Update failed");
        self.surface(&err);
        Err(err)
    }
}

/// List and decode one collection. Rows that do not decode are skipped.
async fn fetch<R>(store: &dyn RowStore, owner: &str) -> Result<Vec<R>, SyncError>
where
    R: Record + DeserializeOwned,
{
    let kind = R::KIND;
    let rows = store
        .list(kind, owner, &kind.ordering())
        .await
        .map_err(|e| SyncError::Fetch {
            kind,
            message: format!("{:#}", e),
        })?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<R>(row) {
            Ok(record) if record.owner() == owner => records.push(record),
            Ok(record) => warn!(%kind, id = record.id(), "Dropping row owned by another user"),
            Err(e) => warn!(%kind, error = %e, "Skipping malformed row"),
        }
    }
    Ok(records)
}

fn apply<R>(slot: &mut Vec<R>, result: Result<Vec<R>, SyncError>, report: &mut LoadReport)
where
    R: Record,
{
    match result {
        Ok(records) => {
            *slot = records;
            report.refreshed.push(R::KIND);
        }
        Err(err) => report.failures.push(err),
    }
}
