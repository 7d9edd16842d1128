// record.rs — Audit record data model.
//
// Every gate decision and every ticket mutation is written as one
// AuditRecord. Records form a chain: each carries `previous_hash`, the hash of
// the JSON line before it, so inserting, dropping, or editing a line is
// detectable.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of event this record captures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The gate evaluated a change and returned Allow or Block.
    GateDecision,
    /// A policy ticket was created.
    TicketCreated,
    /// A reviewer approval was applied to a ticket.
    Approval,
    /// A ticket was rejected.
    Rejection,
    /// An evidence item was marked complete or incomplete.
    Evidence,
}

impl AuditAction {
    /// Whether the action changed a stored ticket.
    pub fn mutates_ticket(self) -> bool {
        !matches!(self, AuditAction::GateDecision)
    }

    fn as_str(self) -> &'static str {
        match self {
            AuditAction::GateDecision => "gate_decision",
            AuditAction::TicketCreated => "ticket_created",
            AuditAction::Approval => "approval",
            AuditAction::Rejection => "rejection",
            AuditAction::Evidence => "evidence",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        [
            AuditAction::GateDecision,
            AuditAction::TicketCreated,
            AuditAction::Approval,
            AuditAction::Rejection,
            AuditAction::Evidence,
        ]
        .into_iter()
        .find(|a| a.as_str() == wanted)
        .ok_or_else(|| format!("unknown audit action: {}", s))
    }
}

/// One line of the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub record_id: Uuid,
    pub timestamp: DateTime<Utc>,

    /// Who triggered the event (reviewer identity, CI job, "cli").
    pub actor: String,

    pub action: AuditAction,

    /// The ticket involved, if any.
    pub ticket_id: Option<String>,

    /// Hash of the input (e.g. the evaluation request).
    pub input_hash: Option<String>,

    /// Hash of the output (e.g. the gate decision).
    pub output_hash: Option<String>,

    /// Hash of the previous line in the log; None for the first record.
    pub previous_hash: Option<String>,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditRecord {
    pub fn new(actor: impl Into<String>, action: AuditAction) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.into(),
            action,
            ticket_id: None,
            input_hash: None,
            output_hash: None,
            previous_hash: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_ticket(mut self, ticket_id: impl Into<String>) -> Self {
        self.ticket_id = Some(ticket_id.into());
        self
    }

    pub fn with_input_hash(mut self, hash: impl Into<String>) -> Self {
        self.input_hash = Some(hash.into());
        self
    }

    pub fn with_output_hash(mut self, hash: impl Into<String>) -> Self {
        self.output_hash = Some(hash.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the record concerns a ticket (case-insensitive id match).
    pub fn is_for_ticket(&self, ticket_id: &str) -> bool {
        self.ticket_id
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(ticket_id))
    }

    /// Describe the first way this record contradicts itself, if any.
    ///
    /// Ticket mutations must name their ticket. Gate decisions must carry
    /// both payload hashes and a verdict, an Allow must name the ticket it
    /// was linked to, and the verdict must agree with the recorded violations.
    pub fn inconsistency(&self) -> Option<String> {
        if self.action.mutates_ticket() {
            return self
                .ticket_id
                .is_none()
                .then(|| format!("{} record names no ticket", self.action));
        }

        if self.input_hash.is_none() || self.output_hash.is_none() {
            return Some("gate decision is missing its request or decision hash".to_string());
        }
        let verdict = self.metadata.get("verdict").and_then(|v| v.as_str());
        let violations = self
            .metadata
            .get("violations")
            .and_then(|v| v.as_array())
            .map_or(0, Vec::len);
        match verdict {
            Some("allow") if self.ticket_id.is_none() => {
                Some("allow decision names no ticket".to_string())
            }
            Some("allow") if violations > 0 => {
                Some(format!("allow decision lists {} violation(s)", violations))
            }
            Some("block") if violations == 0 => {
                Some("block decision lists no violations".to_string())
            }
            Some("allow") | Some("block") => None,
            Some(other) => Some(format!("unknown verdict {:?}", other)),
            None => Some("gate decision has no verdict".to_string()),
        }
    }
}
