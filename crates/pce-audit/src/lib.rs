//! # pce-audit
//!
//! Append-only audit trail for the policy compliance engine.
//!
//! The engine itself never persists decisions; callers record each
//! [`AuditRecord`] (gate decisions, approvals, rejections, evidence updates)
//! in a JSONL [`AuditLog`] whose lines are SHA-256 hash-chained for tamper
//! detection.
//!
//! ```rust,no_run
//! use pce_audit::{AuditAction, AuditLog, AuditRecord};
//!
//! let mut log = AuditLog::open("/tmp/pce-audit.jsonl").unwrap();
//! let mut record = AuditRecord::new("ci", AuditAction::GateDecision)
//!     .with_ticket("PT-AUTH-2026-001");
//! log.append(&mut record).unwrap();
//! ```

pub mod error;
pub mod hasher;
pub mod log;
pub mod record;

pub use error::AuditError;
pub use log::{AuditFilter, AuditLog, ChainReport};
pub use record::{AuditAction, AuditRecord};
