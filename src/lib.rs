pub mod agent_core;
pub mod inference;

use std::path::{Path, PathBuf};

pub use agent_core::{ChatRequest, ChatResponse, ChatService, Orchestrator, Reply, Route, SessionRef};
pub use inference::{ModelsConfig, PipelineConfig};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "agent_relay=info,warn";

/// Rotated log files kept next to `agent.log`.
const LOG_KEEP: u32 = 3;

/// Platform data directory for Agent Relay logs.
///
/// Falls back to `./.agent-relay/logs` when no data directory can be resolved.
pub fn default_log_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("agent-relay"))
        .unwrap_or_else(|| PathBuf::from(".agent-relay"))
        .join("logs")
}

/// Initialize the tracing subscriber.
///
/// With a `log_dir`, rotates `agent.log` (keeping the last 3), then writes
/// JSON lines through a line-flushing writer and returns the log path.
/// Without one, writes human-readable logs to stderr.
pub fn init_tracing(log_dir: Option<&Path>) -> std::io::Result<Option<PathBuf>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let Some(log_dir) = log_dir else {
        fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join("agent.log");
    rotate_log_file(&log_path, LOG_KEEP);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .json()
        .try_init()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== Agent Relay starting ==="
    );
    Ok(Some(log_path))
}

/// Rotate log files: `agent.log` → `agent.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A file writer that flushes after every write, so each log line is on
/// disk before the next model call.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
