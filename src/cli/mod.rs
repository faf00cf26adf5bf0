//! Command-line interface for daybook.
//!
//! Provides commands for capturing journal entries (typed or recorded),
//! processing them, and reviewing or editing the extracted records.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::{
    CommandMicrophone, HttpExtractor, HttpTranscriber, RestStore, StaticAuth, Transcriber,
    WhisperCliTranscriber,
};
use crate::capture::{CaptureCoordinator, CaptureError, CaptureServices, EncodedAudio};
use crate::config::{self, ResolvedConfig, TranscriberBackend};
use crate::domain::{EntityKind, Insights, NoticeBoard, NoticeLevel, RefreshSignal};
use crate::insights::{InsightSynchronizer, SyncError};

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// daybook - narrate your day, get tasks, events, notes and health mentions
#[derive(Parser, Debug)]
#[command(name = "daybook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a typed journal entry for processing
    Submit {
        /// Entry text (reads --input or stdin if not provided)
        text: Option<String>,

        /// Read the entry from a file
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Record from the microphone and transcribe into a journal entry
    Record {
        /// Stop after this many seconds (default: stop on Enter)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Submit the transcribed entry for processing
        #[arg(long)]
        submit: bool,
    },

    /// Transcribe an existing audio file
    Transcribe {
        /// Audio file
        file: PathBuf,

        /// MIME type of the file
        #[arg(long, default_value = "audio/wav")]
        mime_type: String,
    },

    /// Show extracted records
    Insights {
        /// Only show one kind (task, event, note, health)
        #[arg(short, long)]
        kind: Option<EntityKind>,
    },

    /// Toggle a task's completion
    Toggle {
        /// Task ID
        id: String,
    },

    /// Replace the text of a record
    Edit {
        /// Record kind (task, event, note, health)
        kind: EntityKind,

        /// Record ID
        id: String,

        /// New text
        text: String,
    },

    /// Delete a record
    Delete {
        /// Record kind (task, event, note, health)
        kind: EntityKind,

        /// Record ID
        id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// The two components wired together from configuration
struct Session {
    notices: Arc<NoticeBoard>,
    capture: CaptureCoordinator,
    insights: InsightSynchronizer,
}

impl Session {
    fn open(config: &ResolvedConfig) -> Result<Self> {
        let notices = Arc::new(NoticeBoard::new());
        let auth = Arc::new(StaticAuth::new(config.user_id.clone()));
        let refresh = RefreshSignal::new();

        let microphone = CommandMicrophone::from_command_line(&config.capture.recorder)
            .context("capture.recorder is empty")?
            .with_mime_type(config.capture.mime_type.clone());

        let capture = CaptureCoordinator::new(
            CaptureServices {
                microphone: Arc::new(microphone),
                transcriber: build_transcriber(config)?,
                extractor: Arc::new(HttpExtractor::from_settings(&config.service)?),
                auth: auth.clone(),
                notifier: notices.clone(),
            },
            refresh.clone(),
        )
        .with_max_recording_bytes(config.capture.max_recording_bytes);

        let insights = InsightSynchronizer::new(
            Arc::new(RestStore::from_settings(&config.service)?),
            auth,
            notices.clone(),
        )
        .with_refresh(refresh.subscribe());

        Ok(Self {
            notices,
            capture,
            insights,
        })
    }

    /// Print and clear collected notices
    fn flush_notices(&self) {
        for notice in self.notices.drain() {
            match notice.level {
                NoticeLevel::Success => eprintln!("✓ {}", notice.message),
                NoticeLevel::Error => eprintln!("✗ {}", notice.message),
            }
        }
    }
}

fn build_transcriber(config: &ResolvedConfig) -> Result<Arc<dyn Transcriber>> {
    Ok(match config.capture.transcriber {
        TranscriberBackend::Http => Arc::new(HttpTranscriber::from_settings(&config.service)?),
        TranscriberBackend::Whisper => {
            Arc::new(WhisperCliTranscriber::new(config.capture.whisper_model.clone()))
        }
    })
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::config()?;

        if let Commands::Config = self.command {
            show_config(config);
            return Ok(());
        }

        let mut session = Session::open(config)?;
        let result = match self.command {
            Commands::Submit { text, input } => submit_entry(&mut session, text, input).await,
            Commands::Record { seconds, submit } => record_entry(&mut session, seconds, submit).await,
            Commands::Transcribe { file, mime_type } => {
                transcribe_file(config, &file, &mime_type).await
            }
            Commands::Insights { kind } => show_insights(&mut session, kind).await,
            Commands::Toggle { id } => toggle_task(&mut session, &id).await,
            Commands::Edit { kind, id, text } => edit_record(&mut session, kind, &id, text).await,
            Commands::Delete { kind, id } => delete_record(&mut session, kind, &id).await,
            Commands::Config => Ok(()),
        };

        session.flush_notices();

        // Capture and sync errors were already printed as notices.
        if let Err(ref e) = result {
            if e.downcast_ref::<CaptureError>().is_some() || e.downcast_ref::<SyncError>().is_some() {
                std::process::exit(1);
            }
        }
        result
    }
}

/// Read entry text from an argument, a file, or piped stdin
fn read_entry(text: Option<String>, input: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = input {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }
    if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        return Ok(buffer);
    }
    anyhow::bail!("No entry provided. Pass text, use --input <file>, or pipe to stdin")
}

/// Submit a typed entry and show what was extracted
async fn submit_entry(session: &mut Session, text: Option<String>, input: Option<PathBuf>) -> Result<()> {
    session.capture.set_text(read_entry(text, input)?);
    session.capture.submit().await?;

    if let Some(report) = session.insights.sync_if_signalled().await {
        if !report.skipped {
            print_insights(session.insights.insights(), None);
        }
    }
    Ok(())
}

/// Record until Enter (or a timeout), transcribe, optionally submit
async fn record_entry(session: &mut Session, seconds: Option<u64>, submit: bool) -> Result<()> {
    session.capture.start_capture().await?;

    match seconds {
        Some(secs) => {
            eprintln!("Recording for {}s... (Ctrl-C to stop early)", secs);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            eprintln!("Recording... press Enter to stop");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            tokio::select! {
                _ = lines.next_line() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }

    let text = session.capture.stop_and_transcribe().await?;
    println!("{}", text);

    if submit {
        session.capture.submit().await?;
        if let Some(report) = session.insights.sync_if_signalled().await {
            if !report.skipped {
                print_insights(session.insights.insights(), None);
            }
        }
    }
    Ok(())
}

/// Transcribe an audio file without touching the capture state machine
async fn transcribe_file(config: &ResolvedConfig, file: &Path, mime_type: &str) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read audio file: {}", file.display()))?;
    let audio = EncodedAudio::new(bytes, mime_type);

    let transcriber = build_transcriber(config)?;
    let text = transcriber.transcribe(&audio).await?;
    println!("{}", text);
    Ok(())
}

async fn show_insights(session: &mut Session, kind: Option<EntityKind>) -> Result<()> {
    let report = session.insights.load().await;
    if report.skipped {
        eprintln!("Not signed in (set DAYBOOK_USER_ID or auth.user_id)");
        return Ok(());
    }
    print_insights(session.insights.insights(), kind);
    Ok(())
}

async fn toggle_task(session: &mut Session, id: &str) -> Result<()> {
    session.insights.load().await;
    let completed = session.insights.toggle_task(id).await?;
    println!("Task {} is now {}", id, if completed { "done" } else { "open" });
    Ok(())
}

async fn edit_record(session: &mut Session, kind: EntityKind, id: &str, text: String) -> Result<()> {
    session.insights.load().await;
    session.insights.begin_edit(kind, id)?;
    session.insights.set_edit_buffer(text)?;
    session.insights.save_edit().await?;
    Ok(())
}

async fn delete_record(session: &mut Session, kind: EntityKind, id: &str) -> Result<()> {
    session.insights.delete(kind, id).await?;
    Ok(())
}

fn print_insights(insights: &Insights, only: Option<EntityKind>) {
    let show = |kind: EntityKind| only.map_or(true, |k| k == kind);

    if show(EntityKind::Task) {
        println!("\nTasks ({})", insights.tasks.len());
        for task in &insights.tasks {
            let mark = if task.completed { "x" } else { " " };
            let priority = task.priority.as_deref().unwrap_or("-");
            println!("  [{}] {}  ({}, {})", mark, task.title, priority, task.id);
        }
    }

    if show(EntityKind::CalendarEvent) {
        println!("\nEvents ({})", insights.events.len());
        for event in &insights.events {
            let date = event
                .event_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unscheduled".to_string());
            let time = event
                .event_time
                .map(|t| format!(" {}", t.format("%H:%M")))
                .unwrap_or_default();
            println!("  {}{}  {}  ({})", date, time, event.title, event.id);
        }
    }

    if show(EntityKind::Note) {
        println!("\nNotes ({})", insights.notes.len());
        for note in &insights.notes {
            println!("  {}  ({})", note.content, note.id);
        }
    }

    if show(EntityKind::HealthMention) {
        println!("\nHealth ({})", insights.health.len());
        for mention in &insights.health {
            println!("  {}  ({})", mention.content, mention.id);
        }
    }
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) {
    println!("daybook configuration");
    println!("═════════════════════");
    println!();
    match &config.config_file {
        Some(path) => println!("Config file:   {}", path.display()),
        None => println!("Config file:   (none, using defaults)"),
    }
    println!("API URL:       {}", config.service.api_url);
    println!("Transcribe:    {}", config.service.transcribe_url());
    println!("Extract:       {}", config.service.extract_url());
    println!(
        "API key:       {}",
        if config.service.api_key.is_some() { "set" } else { "not set" }
    );
    println!("Timeout:       {}s", config.service.timeout_seconds);
    println!(
        "User:          {}",
        config.user_id.as_deref().unwrap_or("(not signed in)")
    );
    println!();
    println!("Recorder:      {}", config.capture.recorder);
    println!("Transcriber:   {:?}", config.capture.transcriber);
    match config.capture.max_recording_bytes {
        Some(limit) => println!("Max recording: {} bytes", limit),
        None => println!("Max recording: unlimited"),
    }
}
