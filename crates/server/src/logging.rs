//! Tracing setup.
//!
//! Events are written as JSON to stderr. When an audit log is configured,
//! every event that passes the filter is also appended to it as a `STDERR`
//! record, tagged with the event's `correlation_id` field when present.

use std::fmt;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use relay_core::AuditLog;

/// The audit writer reports its own failures through tracing; mirroring
/// those would re-enter the writer.
const AUDIT_TARGET: &str = "relay_core::audit";

pub fn init(audit: &AuditLog) {
    let stderr = tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(stderr)
        .with(audit.is_enabled().then(|| AuditMirror::new(audit.clone())))
        .init();
}

/// Layer that copies events into the audit log.
pub struct AuditMirror {
    audit: AuditLog,
}

impl AuditMirror {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }
}

impl<S: Subscriber> Layer<S> for AuditMirror {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(AUDIT_TARGET) {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let mut data = fields.values;
        data.insert("level".into(), Value::String(meta.level().to_string()));
        data.insert("target".into(), Value::String(meta.target().to_string()));

        self.audit
            .append("STDERR", fields.correlation_id.as_deref(), Value::Object(data));
    }
}

#[derive(Default)]
struct FieldCollector {
    values: Map<String, Value>,
    correlation_id: Option<String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "correlation_id"
            && let Value::String(id) = &value
        {
            self.correlation_id = Some(id.clone());
        }
        self.values.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn read_records(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_events_mirrored_with_correlation_id() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let subscriber = tracing_subscriber::registry().with(AuditMirror::new(AuditLog::to_file(&path, 1024 * 1024)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(correlation_id = %"abc-123", tool = "grep_page_content", "executing tool");
            tracing::warn!(duration_ms = 12u64, "tool failed");
        });

        let records = read_records(&path);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0]["type"], "STDERR");
        assert_eq!(records[0]["requestId"], "abc-123");
        assert_eq!(records[0]["data"]["message"], "executing tool");
        assert_eq!(records[0]["data"]["tool"], "grep_page_content");
        assert_eq!(records[0]["data"]["level"], "INFO");

        assert!(records[1]["requestId"].is_null());
        assert_eq!(records[1]["data"]["duration_ms"], 12);
        assert_eq!(records[1]["data"]["level"], "WARN");
    }

    #[test]
    fn test_audit_writer_events_not_mirrored() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let subscriber = tracing_subscriber::registry().with(AuditMirror::new(AuditLog::to_file(&path, 1024 * 1024)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "relay_core::audit", "audit write failed");
            tracing::info!("kept");
        });

        let records = read_records(&path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["data"]["message"], "kept");
    }
}
