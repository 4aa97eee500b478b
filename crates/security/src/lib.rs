//! Security module for craftbot — privileged directive gating and audit logging.
//!
//! Provides:
//! - **Allowlists**: which chat identities may use privileged directives
//! - **Audit logging**: structured record of granted and denied requests

pub mod allowlist;
pub mod audit;

pub use allowlist::{AdminCheck, AdminPolicy};
pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
