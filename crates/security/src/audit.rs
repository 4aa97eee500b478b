//! Audit logging — structured record of security-relevant decisions.
//!
//! The dispatcher records every privileged directive (granted or not) and
//! every credential the agent typed into chat.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entries kept in memory before the oldest are dropped.
const MAX_ENTRIES: usize = 1024;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A privileged directive was requested
    PrivilegedDirective { directive: String },
    /// The agent answered a server `/register` or `/login` prompt
    CredentialSent { command: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Denied,
}

/// Trait for audit log sinks (where events are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// In-memory audit logger that also forwards to sinks.
pub struct AuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks,
        }
    }

    /// Record an audit event.
    pub fn log(&self, event: AuditEvent, actor: &str, outcome: AuditOutcome, details: Option<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            actor: actor.into(),
            outcome,
            details,
        };

        for sink in &self.sinks {
            sink.record(&entry);
        }

        let mut entries = self.lock();
        if entries.len() >= MAX_ENTRIES {
            entries.remove(0);
        }
        entries.push(entry);
    }

    /// Get all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    pub fn entries_by_outcome(&self, outcome: &AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| &e.outcome == outcome)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A tracing-based audit sink that logs entries on the `audit` target.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            target: "audit",
            event = ?entry.event,
            actor = %entry.actor,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn directive(name: &str) -> AuditEvent {
        AuditEvent::PrivilegedDirective {
            directive: name.into(),
        }
    }

    #[test]
    fn log_and_filter_by_outcome() {
        let logger = AuditLogger::new();
        logger.log(directive("adminhelp"), "owner", AuditOutcome::Success, None);
        logger.log(
            directive("adminhelp"),
            "stranger",
            AuditOutcome::Denied,
            Some("not an admin".into()),
        );

        assert_eq!(logger.count(), 2);
        let denied = logger.entries_by_outcome(&AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].actor, "stranger");
    }

    #[test]
    fn oldest_entries_are_dropped() {
        let logger = AuditLogger::new();
        for i in 0..(MAX_ENTRIES + 5) {
            logger.log(directive("stop"), &format!("p{i}"), AuditOutcome::Success, None);
        }
        let entries = logger.entries();
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].actor, "p5");
    }

    #[test]
    fn credential_event_serializes_with_tag() {
        let json = serde_json::to_value(AuditEvent::CredentialSent {
            command: "/login".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "credential_sent");
        assert_eq!(json["command"], "/login");
    }

    #[test]
    fn tracing_sink_keeps_in_memory_log() {
        let logger = AuditLogger::with_sinks(vec![Box::new(TracingSink)]);
        logger.log(directive("status"), "griefer", AuditOutcome::Denied, None);
        assert_eq!(logger.entries_by_outcome(&AuditOutcome::Denied).len(), 1);
        assert_eq!(format!("{logger:?}"), "AuditLogger { entry_count: 1, sink_count: 1 }");
    }

    #[test]
    fn custom_sink_receives_events() {
        struct TestSink {
            received: Arc<Mutex<Vec<String>>>,
        }

        impl AuditSink for TestSink {
            fn record(&self, entry: &AuditEntry) {
                self.received.lock().unwrap().push(entry.actor.clone());
            }
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let logger = AuditLogger::with_sinks(vec![Box::new(TestSink {
            received: received.clone(),
        })]);

        logger.log(directive("adminhelp"), "owner", AuditOutcome::Success, None);

        assert_eq!(received.lock().unwrap().as_slice(), ["owner".to_string()]);
    }
}
