//! `kanvas` replays board messages onto a board snapshot.
//!
//! Loads a board as returned by the board endpoint, feeds each line of a
//! JSON-lines file of board-topic frames through the event reconciler, and
//! prints the resulting board. Undecodable lines are logged and skipped.
//!
//! ```bash
//! # Print a snapshot as an outline
//! cargo run --bin kanvas -- board.json
//!
//! # Apply captured frames and print JSON
//! cargo run --bin kanvas -- board.json frames.jsonl --format json
//! ```

use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use kanvas::config::{CliArgs, ClientConfig, OutputFormat};
use kanvas::notice::Notice;
use kanvas::reconcile::EventReconciler;
use kanvas::store::EntityStore;
use kanvas_proto::board::Board;

/// Failures that end a replay.
#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("invalid board snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("failed to encode board: {0}")]
    Encode(#[from] kanvas_proto::codec::CodecError),
}

fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(snapshot = %cli.snapshot.display(), "kanvas replay starting");

    match replay(&cli, &config) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "replay failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Logs are written to a file so stdout carries only the board. Returns a
/// [`WorkerGuard`] that must be held until shutdown to ensure all buffered
/// log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("kanvas.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn read(path: &Path) -> Result<String, ReplayError> {
    std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Applies the events file (if any) to the snapshot and renders the result.
fn replay(cli: &CliArgs, config: &ClientConfig) -> Result<String, ReplayError> {
    let board: Board = serde_json::from_str(&read(&cli.snapshot)?)?;
    let board_id = board.board_id;
    let store = EntityStore::new();
    store.replace(board);

    if let Some(events) = &cli.events {
        let (tx, mut rx) = mpsc::channel(config.notice_buffer);
        let reconciler = EventReconciler::new(store.clone(), board_id, tx);
        let mut applied = 0usize;
        let mut skipped = 0usize;
        for (number, line) in read(events)?.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if reconciler.handle_raw(line).is_some() {
                applied += 1;
            } else {
                skipped += 1;
                tracing::warn!(line = number + 1, "skipped undecodable frame");
            }
            // Drain so warnings never fill the channel.
            while let Ok(notice) = rx.try_recv() {
                if let Notice::Warning(text) = notice {
                    eprintln!("line {}: {text}", number + 1);
                }
            }
        }
        tracing::info!(applied, skipped, "replay finished");
    }

    let Some(board) = store.read() else {
        return Ok(String::new());
    };
    match config.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&*board).map_err(|e| ReplayError::Encode(e.into()))
        }
        OutputFormat::Text => Ok(render_text(&board)),
    }
}

/// Renders the board as an indented outline.
fn render_text(board: &Board) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (#{})", board.name, board.board_id);
    if let Some(description) = board.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "  {description}");
    }
    for column in &board.columns {
        let _ = writeln!(
            out,
            "\n[{}] {} @ {}",
            column.column_id,
            column.name,
            column.order_index.value()
        );
        for task in &column.tasks {
            let mut flags = vec![task.status.to_string()];
            if let Some(priority) = task.priority {
                flags.push(priority.to_string());
            }
            if task.is_expired {
                flags.push("EXPIRED".to_string());
            }
            if !task.assignee_ids.is_empty() {
                let ids: Vec<String> = task.assignee_ids.iter().map(ToString::to_string).collect();
                flags.push(format!("assignees {}", ids.join(",")));
            }
            let _ = writeln!(
                out,
                "  - #{} {} @ {} [{}]",
                task.task_id,
                task.title,
                task.order_index.value(),
                flags.join(", ")
            );
        }
    }
    if !board.board_members.is_empty() {
        let _ = writeln!(out, "\nmembers:");
        for member in &board.board_members {
            let _ = writeln!(out, "  - {} ({:?})", member.username, member.board_role);
        }
    }
    out.truncate(out.trim_end().len());
    out
}
