//! Size-capped JSONL audit log.
//!
//! One JSON object per line: `{timestamp, type, requestId, data}`. When the
//! next record would push the file past its ceiling, the oldest quarter of
//! the records is dropped by rewriting the file, then the record is appended.
//! Writing is best-effort; failures are reported through `tracing` and never
//! reach the operation being audited.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `body` strings above this many characters are cut before logging.
pub const MAX_LOGGED_BODY_CHARS: usize = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum LogWriteError {
    #[error("audit log I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("audit record could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug)]
struct LogSink {
    path: PathBuf,
    max_bytes: u64,
    lock: Mutex<()>,
}

/// Handle to the audit log. Cloning shares the underlying file and lock.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    sink: Option<Arc<LogSink>>,
}

impl AuditLog {
    /// An audit log that discards every record.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn to_file(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self { sink: Some(Arc::new(LogSink { path: path.into(), max_bytes, lock: Mutex::new(()) })) }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Append one record. Never fails; problems are logged and swallowed.
    pub fn append(&self, kind: &str, correlation_id: Option<&str>, data: Value) {
        let Some(sink) = &self.sink else { return };

        let record = LogRecord {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            request_id: correlation_id.map(str::to_string),
            data: prepare_body(data),
        };

        if let Err(e) = sink.write(&record) {
            tracing::warn!(path = %sink.path.display(), error = %e, kind, "failed to write audit record");
        }
    }
}

impl LogSink {
    fn write(&self, record: &LogRecord) -> Result<(), LogWriteError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        // A poisoned lock only means another writer panicked mid-append.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        if current + line.len() as u64 > self.max_bytes {
            match rotate(&self.path) {
                Ok(removed) => {
                    tracing::info!(path = %self.path.display(), removed, "rotated audit log");
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "audit log rotation failed, appending anyway");
                }
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Drop the oldest quarter of the records (at least one). Returns how many
/// records were removed.
fn rotate(path: &Path) -> io::Result<usize> {
    let existing = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let records: Vec<&str> = existing.lines().filter(|line| !line.trim().is_empty()).collect();
    if records.is_empty() {
        return Ok(0);
    }

    let remove = (records.len() / 4).max(1);
    let mut kept = records[remove..].join("\n");
    if !kept.is_empty() {
        kept.push('\n');
    }
    fs::write(path, kept)?;

    Ok(remove)
}

/// Pretty-print a JSON `body` and cut it down to [`MAX_LOGGED_BODY_CHARS`].
fn prepare_body(mut data: Value) -> Value {
    if let Some(Value::String(body)) = data.get_mut("body") {
        if let Ok(parsed) = serde_json::from_str::<Value>(body)
            && let Ok(pretty) = serde_json::to_string_pretty(&parsed)
        {
            *body = pretty;
        }
        if body.chars().count() > MAX_LOGGED_BODY_CHARS {
            *body = truncate_chars(body, MAX_LOGGED_BODY_CHARS, "\n... (truncated for log size)");
        }
    }
    data
}

/// Keep the first `max` characters of `text`, appending `marker` when
/// anything was cut.
pub fn truncate_chars(text: &str, max: usize, marker: &str) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{marker}", &text[..cut]),
        None => text.to_string(),
    }
}
