// decision.rs — Gate decision and its reasons.
//
// A GateDecision is produced fresh per evaluation and never persisted by
// the engine; callers write it to the audit log. Every violated rule is a
// `Violation` with a closed `ViolationKind`, so CI integrations can branch
// on the kind while humans read `reasons`.

use std::fmt;

use pce_policy::{AutonomyMode, ClassifyError, EvidencePhase, RiskLevel};
use pce_ticket::{TicketError, TicketStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Block,
}

impl Verdict {
    /// Process exit status a CI gate should report.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Allow => 0,
            Verdict::Block => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Block => write!(f, "block"),
        }
    }
}

/// Why a change was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    EmptyChangeSet,
    PathTraversal,
    UnknownDomain,
    MalformedTicketReference,
    TicketNotFound,
    /// The ticket could not be read from its store.
    TicketUnreadable,
    TicketDomainMismatch,
    RiskLevelMismatch,
    TicketRejected,
    ScopeViolation,
    ProhibitedActionDetected,
    InsufficientApprovals,
    IncompleteEvidence,
}

impl ViolationKind {
    /// Classification and linking failures abort evaluation on their own.
    pub fn is_single_cause(self) -> bool {
        matches!(
            self,
            ViolationKind::EmptyChangeSet
                | ViolationKind::PathTraversal
                | ViolationKind::UnknownDomain
                | ViolationKind::MalformedTicketReference
                | ViolationKind::TicketNotFound
                | ViolationKind::TicketUnreadable
                | ViolationKind::TicketDomainMismatch
                | ViolationKind::RiskLevelMismatch
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ClassifyError> for Violation {
    fn from(err: ClassifyError) -> Self {
        let kind = match err {
            ClassifyError::EmptyChangeSet => ViolationKind::EmptyChangeSet,
            ClassifyError::UnknownDomain { .. } => ViolationKind::UnknownDomain,
            ClassifyError::PathTraversal { .. } => ViolationKind::PathTraversal,
        };
        Violation::new(kind, err.to_string())
    }
}

impl From<TicketError> for Violation {
    fn from(err: TicketError) -> Self {
        let kind = match err {
            TicketError::MalformedTicketReference { .. } | TicketError::InvalidTicketId { .. } => {
                ViolationKind::MalformedTicketReference
            }
            TicketError::TicketNotFound { .. } => ViolationKind::TicketNotFound,
            TicketError::DomainMismatch { .. } => ViolationKind::TicketDomainMismatch,
            TicketError::RiskLevelMismatch { .. } => ViolationKind::RiskLevelMismatch,
            TicketError::ProhibitedActionDetected { .. } => ViolationKind::ProhibitedActionDetected,
            TicketError::TicketClosed { .. } => ViolationKind::TicketRejected,
            TicketError::InvalidScopePattern { .. } => ViolationKind::ScopeViolation,
            TicketError::InvalidTransition { .. }
            | TicketError::AlreadyExists { .. }
            | TicketError::IoError { .. }
            | TicketError::SerializationError(_)
            | TicketError::LockPoisoned(_) => ViolationKind::TicketUnreadable,
        };
        Violation::new(kind, err.to_string())
    }
}

/// One step of the evaluation, for the decision trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCheck {
    /// Which check ran (e.g. "classify", "approvals").
    pub check: String,
    /// "passed", "skipped: ...", or "failed: ...".
    pub outcome: String,
    /// Whether evaluation stopped here.
    #[serde(default)]
    pub terminal: bool,
}

/// The engine's verdict for one change at one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub verdict: Verdict,

    /// None when classification itself failed.
    pub effective_risk: Option<RiskLevel>,

    /// The more restrictive of the change's and the ticket's autonomy mode.
    pub autonomy_mode: Option<AutonomyMode>,

    pub matched_domains: Vec<String>,
    pub missing_approval_roles: Vec<String>,
    pub missing_evidence_ids: Vec<String>,

    /// Earlier-phase items still open that do not block at this risk level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisory_evidence_ids: Vec<String>,

    /// One human-readable line per violation, in evaluation order.
    pub reasons: Vec<String>,
    pub violations: Vec<Violation>,

    pub ticket_id: Option<String>,

    /// Ticket status after the request's approvals were applied.
    pub ticket_status: Option<TicketStatus>,

    pub phase: EvidencePhase,
    pub checks: Vec<GateCheck>,
}

impl GateDecision {
    pub(crate) fn new(phase: EvidencePhase) -> Self {
        Self {
            verdict: Verdict::Block,
            effective_risk: None,
            autonomy_mode: None,
            matched_domains: Vec::new(),
            missing_approval_roles: Vec::new(),
            missing_evidence_ids: Vec::new(),
            advisory_evidence_ids: Vec::new(),
            reasons: Vec::new(),
            violations: Vec::new(),
            ticket_id: None,
            ticket_status: None,
            phase,
            checks: Vec::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    /// Whether any violation of `kind` was reported.
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    pub fn violation_kinds(&self) -> Vec<ViolationKind> {
        self.violations.iter().map(|v| v.kind).collect()
    }

    pub(crate) fn violate(&mut self, violation: Violation) {
        self.reasons.push(violation.message.clone());
        self.violations.push(violation);
    }

    pub(crate) fn record(&mut self, check: &str, outcome: impl Into<String>, terminal: bool) {
        self.checks.push(GateCheck {
            check: check.to_string(),
            outcome: outcome.into(),
            terminal,
        });
    }

    /// Seal the verdict: Allow only when nothing was violated.
    pub(crate) fn finish(mut self) -> Self {
        self.verdict = if self.violations.is_empty() {
            Verdict::Allow
        } else {
            Verdict::Block
        };
        self
    }
}
