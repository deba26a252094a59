//! Logging
//!
//! The retry and streaming code report through an injected [`LogSink`] rather
//! than calling `tracing` directly, so callers and tests can observe messages.

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Receives human-readable messages about retries and terminal failures
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Default sink: forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "azure_openai_helper", "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(target: "azure_openai_helper", "{}", message);
        } else if level == Level::INFO {
            tracing::info!(target: "azure_openai_helper", "{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!(target: "azure_openai_helper", "{}", message);
        } else {
            tracing::trace!(target: "azure_openai_helper", "{}", message);
        }
    }
}

/// A single recorded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// Sink that keeps every message in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Messages logged at exactly `level`
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
        });
    }
}

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
