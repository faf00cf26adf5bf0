//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Notify};

use daybook::adapters::{
    AudioInput, DeviceHandle, Extractor, Microphone, MicrophoneError, Row, RowStore,
    StaticAuth, Transcriber,
};
use daybook::capture::{CaptureCoordinator, CaptureServices, EncodedAudio};
use daybook::domain::{EntityKind, NoticeBoard, Ordering as ListOrdering, RefreshSignal};
use daybook::insights::InsightSynchronizer;

pub const USER: &str = "user-1";

// ============================================================================
// Microphone
// ============================================================================

#[derive(Default)]
pub struct FakeMicrophone {
    pub acquired: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub deny: bool,
    pub chunks: Vec<Vec<u8>>,
}

impl FakeMicrophone {
    pub fn with_chunks(chunks: &[&[u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            ..Default::default()
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Default::default()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct FakeDevice {
    released: Arc<AtomicUsize>,
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl DeviceHandle for FakeDevice {
    fn release(&mut self) {
        self.sender = None;
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Microphone for FakeMicrophone {
    async fn acquire(&self) -> Result<AudioInput, MicrophoneError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(MicrophoneError::PermissionDenied("user said no".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &self.chunks {
            let _ = tx.send(chunk.clone());
        }

        Ok(AudioInput {
            chunks: rx,
            handle: Box::new(FakeDevice {
                released: self.released.clone(),
                sender: Some(tx),
            }),
            mime_type: "audio/webm".to_string(),
        })
    }
}

// ============================================================================
// Transcriber
// ============================================================================

pub struct FakeTranscriber {
    pub reply: Mutex<Result<String, String>>,
    pub calls: Mutex<Vec<EncodedAudio>>,
    pub gate: Option<Arc<Notify>>,
}

impl FakeTranscriber {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Mutex::new(Ok(text.to_string())),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Mutex::new(Err(message.to_string())),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(text: &str, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::replying(text)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transcribe(&self, audio: &EncodedAudio) -> Result<String> {
        self.calls.lock().unwrap().push(audio.clone());
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        let reply = self.reply.lock().unwrap().clone();
        reply.map_err(|e| anyhow::anyhow!(e))
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Records calls; optionally writes records into a store like the real
/// extraction service would.
pub struct FakeExtractor {
    pub fail: bool,
    pub calls: Mutex<Vec<(String, String)>>,
    pub gate: Option<Arc<Notify>>,
    pub store: Option<Arc<MemoryStore>>,
}

impl FakeExtractor {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
            gate: None,
            store: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::ok()
        }
    }

    /// Splits the entry on " and " and creates one task per part
    pub fn writing_to(store: Arc<MemoryStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::ok()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, journal_content: &str, user_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((journal_content.to_string(), user_id.to_string()));
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        if self.fail {
            anyhow::bail!("model overloaded");
        }
        if let Some(ref store) = self.store {
            for (i, part) in journal_content.split(" and ").enumerate() {
                store.insert(
                    EntityKind::Task,
                    task_row(&format!("extracted-{}", i), part.trim(), user_id, "2026-10-19T09:00:00Z"),
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<EntityKind, Vec<Row>>>,
    pub failing_lists: Mutex<HashSet<EntityKind>>,
    pub fail_writes: Mutex<bool>,
    pub list_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: EntityKind, row: Row) {
        self.rows.lock().unwrap().entry(kind).or_default().push(row);
    }

    pub fn row(&self, kind: EntityKind, id: &str) -> Option<Row> {
        self.rows
            .lock()
            .unwrap()
            .get(&kind)
            .and_then(|rows| rows.iter().find(|r| r["id"] == id).cloned())
    }

    pub fn fail_list(&self, kind: EntityKind, fail: bool) {
        let mut failing = self.failing_lists.lock().unwrap();
        if fail {
            failing.insert(kind);
        } else {
            failing.remove(&kind);
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

fn compare_column(a: &Value, b: &Value, column: &str, ascending: bool) -> CmpOrdering {
    match (&a[column], &b[column]) {
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Greater,
        (_, Value::Null) => CmpOrdering::Less,
        (x, y) => {
            let ord = x.as_str().unwrap_or_default().cmp(y.as_str().unwrap_or_default());
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn list(&self, kind: EntityKind, owner: &str, ordering: &ListOrdering) -> Result<Vec<Row>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_lists.lock().unwrap().contains(&kind) {
            anyhow::bail!("connection reset while listing {}", kind.collection());
        }

        let mut rows: Vec<Row> = self
            .rows
            .lock()
            .unwrap()
            .get(&kind)
            .map(|rows| rows.iter().filter(|r| r["user_id"] == owner).cloned().collect())
            .unwrap_or_default();

        rows.sort_by(|a, b| compare_column(a, b, ordering.column, ordering.ascending));
        if let Some(limit) = ordering.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn update(
        &self,
        kind: EntityKind,
        owner: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<usize> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            anyhow::bail!("store unavailable");
        }

        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.entry(kind).or_default().iter_mut() {
            if row["id"] == id && row["user_id"] == owner {
                if let Some(object) = row.as_object_mut() {
                    for (key, value) in fields {
                        object.insert(key.clone(), value.clone());
                    }
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn delete(&self, kind: EntityKind, owner: &str, id: &str) -> Result<usize> {
        if *self.fail_writes.lock().unwrap() {
            anyhow::bail!("store unavailable");
        }

        let mut rows = self.rows.lock().unwrap();
        let collection = rows.entry(kind).or_default();
        let before = collection.len();
        collection.retain(|r| !(r["id"] == id && r["user_id"] == owner));
        Ok(before - collection.len())
    }
}

// ============================================================================
// Row builders
// ============================================================================

pub fn task_row(id: &str, title: &str, owner: &str, created_at: &str) -> Row {
    json!({
        "id": id,
        "title": title,
        "completed": false,
        "priority": "medium",
        "user_id": owner,
        "created_at": created_at,
    })
}

pub fn event_row(id: &str, title: &str, owner: &str, date: Option<&str>) -> Row {
    json!({
        "id": id,
        "title": title,
        "event_date": date,
        "event_time": null,
        "user_id": owner,
        "created_at": "2026-10-19T08:00:00Z",
    })
}

pub fn content_row(id: &str, content: &str, owner: &str, created_at: &str) -> Row {
    json!({
        "id": id,
        "content": content,
        "user_id": owner,
        "created_at": created_at,
    })
}

/// A store holding a little of everything for USER, plus one foreign task
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert(EntityKind::Task, task_row("t1", "Buy milk", USER, "2026-10-19T08:00:00Z"));
    store.insert(EntityKind::Task, task_row("t2", "Call mom", USER, "2026-10-19T09:00:00Z"));
    store.insert(EntityKind::Task, task_row("t-other", "Not mine", "user-2", "2026-10-19T10:00:00Z"));
    store.insert(EntityKind::CalendarEvent, event_row("e1", "Dentist", USER, Some("2026-10-22")));
    store.insert(EntityKind::Note, content_row("n1", "Felt productive", USER, "2026-10-19T08:00:00Z"));
    store.insert(EntityKind::HealthMention, content_row("h1", "Ran 5k", USER, "2026-10-19T07:00:00Z"));
    store
}

// ============================================================================
// Harnesses
// ============================================================================

pub struct CaptureHarness {
    pub coordinator: CaptureCoordinator,
    pub microphone: Arc<FakeMicrophone>,
    pub transcriber: Arc<FakeTranscriber>,
    pub extractor: Arc<FakeExtractor>,
    pub auth: Arc<StaticAuth>,
    pub notices: Arc<NoticeBoard>,
    pub refresh: RefreshSignal,
}

pub fn capture_harness(
    microphone: FakeMicrophone,
    transcriber: FakeTranscriber,
    extractor: FakeExtractor,
) -> CaptureHarness {
    let microphone = Arc::new(microphone);
    let transcriber = Arc::new(transcriber);
    let extractor = Arc::new(extractor);
    let auth = Arc::new(StaticAuth::signed_in(USER));
    let notices = Arc::new(NoticeBoard::new());
    let refresh = RefreshSignal::new();

    let coordinator = CaptureCoordinator::new(
        CaptureServices {
            microphone: microphone.clone(),
            transcriber: transcriber.clone(),
            extractor: extractor.clone(),
            auth: auth.clone(),
            notifier: notices.clone(),
        },
        refresh.clone(),
    );

    CaptureHarness {
        coordinator,
        microphone,
        transcriber,
        extractor,
        auth,
        notices,
        refresh,
    }
}

pub fn synchronizer(
    store: Arc<MemoryStore>,
    auth: Arc<StaticAuth>,
    notices: Arc<NoticeBoard>,
) -> InsightSynchronizer {
    InsightSynchronizer::new(store, auth, notices)
}
