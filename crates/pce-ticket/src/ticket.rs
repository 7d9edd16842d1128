// ticket.rs — PolicyTicket: the record authorizing a bounded scope of change.
//
// A ticket carries the risk level and autonomy mode it was filed under, the
// path scope it covers, and the approvals and evidence collected so far.
//
// Status lifecycle:
//   Open → PartiallyApproved → Approved
//   Open → Approved                      (all roles satisfied at once)
//   Open | PartiallyApproved → Rejected  (explicit rejection)
// Approved and Rejected are terminal. Tickets are never deleted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use glob::Pattern;
use pce_policy::{normalize_role, AutonomyMode, EvidenceRequirement, RiskLevel};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TicketError;

/// Ticket reference syntax. The year segment is optional to accept the
/// short `PT-<DOMAIN>-<NNN>` form.
pub(crate) const TICKET_ID_PATTERN: &str = r"PT-([A-Z]+(?:-[A-Z]+)*)(?:-([0-9]{4}))?-([0-9]{3})";

fn anchored_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("^{}$", TICKET_ID_PATTERN)).expect("ticket id pattern is valid")
    })
}

/// A validated ticket id such as `PT-AUTH-2026-001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketId(String);

impl TicketId {
    pub fn parse(s: &str) -> Result<Self, TicketError> {
        let trimmed = s.trim();
        if anchored_id_regex().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(TicketError::InvalidTicketId { id: s.to_string() })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The domain segment, e.g. `AUTH` or `USER-PROFILE`.
    pub fn domain(&self) -> &str {
        anchored_id_regex()
            .captures(&self.0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default()
    }

    /// The year segment, absent in the short form.
    pub fn year(&self) -> Option<u16> {
        anchored_id_regex()
            .captures(&self.0)
            .and_then(|c| c.get(2))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TicketId {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TicketId {
    type Error = TicketError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TicketId> for String {
    fn from(id: TicketId) -> Self {
        id.0
    }
}

/// Approval status of a ticket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    PartiallyApproved,
    Approved,
    Rejected,
}

impl TicketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Approved | TicketStatus::Rejected)
    }

    /// Check whether moving from this status to `next` is valid.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Open, TicketStatus::PartiallyApproved)
                | (TicketStatus::Open, TicketStatus::Approved)
                | (TicketStatus::PartiallyApproved, TicketStatus::Approved)
                | (TicketStatus::Open, TicketStatus::Rejected)
                | (TicketStatus::PartiallyApproved, TicketStatus::Rejected)
        )
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "open" => Ok(TicketStatus::Open),
            "partially_approved" => Ok(TicketStatus::PartiallyApproved),
            "approved" => Ok(TicketStatus::Approved),
            "rejected" => Ok(TicketStatus::Rejected),
            other => Err(format!("unknown ticket status '{}'", other)),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::PartiallyApproved => write!(f, "partially_approved"),
            TicketStatus::Approved => write!(f, "approved"),
            TicketStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// One reviewer's approval. Keyed by identity in the ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub role: String,
    pub approved_at: DateTime<Utc>,
}

/// Who rejected the ticket and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectionRecord {
    pub identity: String,
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// A policy ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyTicket {
    pub id: TicketId,

    /// The risk domain this ticket is filed under.
    pub domain: String,

    #[serde(alias = "riskLevel")]
    pub risk_level: RiskLevel,

    #[serde(alias = "autonomyMode")]
    pub autonomy_mode: AutonomyMode,

    /// If non-empty, every changed path must match one of these globs.
    #[serde(default, alias = "allowedScope")]
    pub allowed_scope: Vec<String>,

    /// Changed paths matching any of these globs are out of bounds.
    #[serde(default, alias = "prohibitedScope")]
    pub prohibited_scope: Vec<String>,

    /// Evidence the ticket itself declares, on top of the registry's.
    #[serde(default)]
    pub required_evidence: Vec<EvidenceRequirement>,

    /// Reviewer identity → approval. One vote per identity.
    #[serde(default)]
    pub approvals: BTreeMap<String, ApprovalRecord>,

    /// Evidence item id → completed.
    #[serde(default)]
    pub evidence: BTreeMap<String, bool>,

    #[serde(default)]
    pub status: TicketStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionRecord>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyTicket {
    /// Create an Open ticket with no scope restrictions.
    pub fn new(
        id: TicketId,
        domain: impl Into<String>,
        risk_level: RiskLevel,
        autonomy_mode: AutonomyMode,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            domain: domain.into(),
            risk_level,
            autonomy_mode,
            allowed_scope: Vec::new(),
            prohibited_scope: Vec::new(),
            required_evidence: Vec::new(),
            approvals: BTreeMap::new(),
            evidence: BTreeMap::new(),
            status: TicketStatus::Open,
            rejection: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_allowed_scope(mut self, patterns: Vec<String>) -> Self {
        self.allowed_scope = patterns;
        self
    }

    pub fn with_prohibited_scope(mut self, patterns: Vec<String>) -> Self {
        self.prohibited_scope = patterns;
        self
    }

    pub fn with_required_evidence(mut self, evidence: Vec<EvidenceRequirement>) -> Self {
        self.required_evidence = evidence;
        self
    }

    /// Move to a new status. Returns an error if the transition is invalid.
    pub fn transition(&mut self, next: TicketStatus) -> Result<(), TicketError> {
        if !self.status.can_transition_to(next) {
            return Err(TicketError::InvalidTransition {
                ticket_id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Roles held by at least one recorded approver.
    pub fn satisfied_roles(&self) -> BTreeSet<String> {
        self.approvals
            .values()
            .map(|a| normalize_role(&a.role))
            .collect()
    }

    /// Required roles that no approver holds yet.
    pub fn missing_roles(&self, required: &BTreeSet<String>) -> BTreeSet<String> {
        let satisfied = self.satisfied_roles();
        required
            .iter()
            .filter(|r| !satisfied.contains(*r))
            .cloned()
            .collect()
    }

    /// Whether the ticket's declared domain matches `domain` (case-insensitive).
    pub fn is_filed_under(&self, domain: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain)
    }

    /// Changed paths that fall outside the ticket's declared scope.
    ///
    /// A path violates scope if it matches a prohibited pattern, or if an
    /// allowed scope is declared and the path matches none of it.
    pub fn scope_violations<S: AsRef<str>>(
        &self,
        paths: &[S],
    ) -> Result<Vec<ScopeViolation>, TicketError> {
        let allowed = compile_scope(&self.allowed_scope)?;
        let prohibited = compile_scope(&self.prohibited_scope)?;

        let mut violations = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if let Some(p) = prohibited.iter().find(|p| p.matches(path)) {
                violations.push(ScopeViolation {
                    path: path.to_string(),
                    reason: format!("matches prohibited scope '{}'", p.as_str()),
                });
            } else if !allowed.is_empty() && !allowed.iter().any(|p| p.matches(path)) {
                violations.push(ScopeViolation {
                    path: path.to_string(),
                    reason: "outside the ticket's allowed scope".to_string(),
                });
            }
        }
        Ok(violations)
    }
}

/// A changed path outside the ticket's scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeViolation {
    pub path: String,
    pub reason: String,
}

fn compile_scope(patterns: &[String]) -> Result<Vec<Pattern>, TicketError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| TicketError::InvalidScopePattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> PolicyTicket {
        PolicyTicket::new(
            TicketId::parse("PT-AUTH-2026-001").unwrap(),
            "auth",
            RiskLevel::High,
            AutonomyMode::Supervised,
        )
    }

    #[test]
    fn ticket_id_accepts_long_and_short_forms() {
        let long = TicketId::parse("PT-USER-PROFILE-2026-042").unwrap();
        assert_eq!(long.domain(), "USER-PROFILE");
        assert_eq!(long.year(), Some(2026));

        let short = TicketId::parse("PT-BILLING-001").unwrap();
        assert_eq!(short.domain(), "BILLING");
        assert_eq!(short.year(), None);
    }

    #[test]
    fn ticket_id_rejects_bad_syntax() {
        for bad in ["PT-auth-2026-001", "PT-AUTH-26-001", "PT-AUTH-2026-01", "XX-AUTH-001", ""] {
            assert!(TicketId::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn ticket_id_serializes_as_plain_string() {
        let id = TicketId::parse("PT-AUTH-2026-001").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"PT-AUTH-2026-001\"");
        assert!(serde_json::from_str::<TicketId>("\"nope\"").is_err());
    }

    #[test]
    fn valid_status_transitions() {
        assert!(TicketStatus::Open.can_transition_to(TicketStatus::PartiallyApproved));
        assert!(TicketStatus::Open.can_transition_to(TicketStatus::Approved));
        assert!(TicketStatus::PartiallyApproved.can_transition_to(TicketStatus::Approved));
        assert!(TicketStatus::PartiallyApproved.can_transition_to(TicketStatus::Rejected));
    }

    #[test]
    fn terminal_statuses_do_not_move() {
        for next in [
            TicketStatus::Open,
            TicketStatus::PartiallyApproved,
            TicketStatus::Approved,
            TicketStatus::Rejected,
        ] {
            assert!(!TicketStatus::Approved.can_transition_to(next));
            assert!(!TicketStatus::Rejected.can_transition_to(next));
        }
    }

    #[test]
    fn invalid_transition_is_an_error() {
        let mut t = ticket();
        t.transition(TicketStatus::Rejected).unwrap();
        assert!(matches!(
            t.transition(TicketStatus::Approved),
            Err(TicketError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn missing_roles_uses_normalized_role_names() {
        let mut t = ticket();
        t.approvals.insert(
            "alice".to_string(),
            ApprovalRecord {
                role: "Tech Lead".to_string(),
                approved_at: Utc::now(),
            },
        );
        let required = BTreeSet::from(["tech_lead".to_string(), "security_lead".to_string()]);
        assert_eq!(
            t.missing_roles(&required),
            BTreeSet::from(["security_lead".to_string()])
        );
    }

    #[test]
    fn scope_violations_cover_prohibited_and_allowed() {
        let t = ticket()
            .with_allowed_scope(vec!["backend/auth/**".to_string()])
            .with_prohibited_scope(vec!["backend/auth/keys/**".to_string()]);
        let violations = t
            .scope_violations(&[
                "backend/auth/login.py",
                "backend/auth/keys/signing.py",
                "backend/billing/routes.py",
            ])
            .unwrap();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].path, "backend/auth/keys/signing.py");
        assert!(violations[0].reason.contains("prohibited"));
        assert_eq!(violations[1].path, "backend/billing/routes.py");
    }

    #[test]
    fn empty_allowed_scope_allows_everything_not_prohibited() {
        let t = ticket();
        assert!(t.scope_violations(&["anything/at/all.rs"]).unwrap().is_empty());
    }

    #[test]
    fn ticket_json_round_trip_keeps_status_and_approvals() {
        let mut t = ticket();
        t.approvals.insert(
            "bob".to_string(),
            ApprovalRecord {
                role: "security_lead".to_string(),
                approved_at: Utc::now(),
            },
        );
        t.transition(TicketStatus::PartiallyApproved).unwrap();
        let json = serde_json::to_string_pretty(&t).unwrap();
        let restored: PolicyTicket = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, t);
    }
}
