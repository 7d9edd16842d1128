// error.rs — Error types for ticket linking, approvals, and persistence.

use pce_policy::RiskLevel;
use thiserror::Error;

/// Errors that can occur while linking, mutating, or storing policy tickets.
#[derive(Debug, Error)]
pub enum TicketError {
    /// The description carries no ticket id, or more than one distinct id.
    #[error("malformed ticket reference: {reason}")]
    MalformedTicketReference { reason: String },

    /// A string does not follow the `PT-<DOMAIN>-<YYYY>-<NNN>` syntax.
    #[error("invalid ticket id '{id}' (expected PT-<DOMAIN>-<YYYY>-<NNN>)")]
    InvalidTicketId { id: String },

    /// The referenced ticket does not exist.
    #[error("ticket not found: {id}")]
    TicketNotFound { id: String },

    /// The ticket's declared domain is not among the changeset's domains.
    #[error("ticket {ticket_id} is filed under domain '{ticket_domain}', but the change touches [{matched}]")]
    DomainMismatch {
        ticket_id: String,
        ticket_domain: String,
        matched: String,
    },

    /// The ticket declares a lower risk level than the change actually has.
    #[error("ticket {ticket_id} declares risk '{declared}' but the change is '{effective}'")]
    RiskLevelMismatch {
        ticket_id: String,
        declared: RiskLevel,
        effective: RiskLevel,
    },

    /// Approval was attempted on production code in a Critical AnalysisOnly domain.
    #[error("ticket {ticket_id} is critical/analysis-only; production paths cannot be approved: {paths:?}")]
    ProhibitedActionDetected {
        ticket_id: String,
        paths: Vec<String>,
    },

    /// The ticket is in a terminal state that rejects this mutation.
    #[error("ticket {ticket_id} is {status} and can no longer be changed")]
    TicketClosed { ticket_id: String, status: String },

    /// Invalid status transition.
    #[error("invalid transition from {from} to {to} for ticket {ticket_id}")]
    InvalidTransition {
        ticket_id: String,
        from: String,
        to: String,
    },

    /// A ticket with this id is already stored.
    #[error("ticket already exists: {id}")]
    AlreadyExists { id: String },

    /// A scope pattern on the ticket is not a valid glob.
    #[error("invalid scope pattern '{pattern}': {reason}")]
    InvalidScopePattern { pattern: String, reason: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize ticket data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A per-ticket lock was poisoned by a panicking writer.
    #[error("ticket lock poisoned: {0}")]
    LockPoisoned(String),
}
