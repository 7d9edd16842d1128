// approval.rs — Approval Resolver.
//
// Applies reviewer approvals and rejections to a ticket and keeps its status
// in step with the roles the change requires.
//
// On each approval:
// 1. Rejected ticket → TicketClosed.
// 2. Critical + AnalysisOnly with production paths → ProhibitedActionDetected,
//    whoever the approver is.
// 3. Identity already recorded → no-op (duplicate delivery is expected).
// 4. Record the approver, then recompute: all required roles held → Approved,
//    some → PartiallyApproved, none → stays Open. An Approved ticket keeps its
//    status but still collects new approvers, since a later change under the
//    same ticket may require a role nobody has approved as yet.
//
// Any holder of a required role satisfies it; approvers are not pinned to
// specific tickets.

use std::collections::BTreeSet;

use chrono::Utc;
use pce_policy::{normalize_role, AllowList, Classification};
use serde::{Deserialize, Serialize};

use crate::error::TicketError;
use crate::ticket::{ApprovalRecord, PolicyTicket, RejectionRecord, TicketStatus};

/// A reviewer action delivered by the repository host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ApprovalEvent {
    pub identity: String,
    pub role: String,
}

impl ApprovalEvent {
    pub fn new(identity: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            role: role.into(),
        }
    }
}

/// What an approval event did to the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// The approver was added; `status` is the status afterwards.
    Recorded { status: TicketStatus },
    /// The identity had already approved; nothing changed.
    Duplicate { status: TicketStatus },
}

impl ApprovalOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, ApprovalOutcome::Recorded { .. })
    }
}

/// Resolves approvals for one ticket against one change's obligations.
#[derive(Debug, Clone, Default)]
pub struct ApprovalResolver {
    required_roles: BTreeSet<String>,
    /// Production paths that make any approval a prohibited action.
    prohibited_paths: Vec<String>,
}

impl ApprovalResolver {
    /// A resolver for a fixed set of required roles with no ceiling.
    pub fn new<I, S>(required_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            required_roles: required_roles
                .into_iter()
                .map(|r| normalize_role(r.as_ref()))
                .filter(|r| !r.is_empty())
                .collect(),
            prohibited_paths: Vec::new(),
        }
    }

    /// A resolver for a classified change under a ticket.
    ///
    /// The AnalysisOnly ceiling applies if either the change or the ticket is
    /// Critical and AnalysisOnly.
    pub fn for_change(
        classification: &Classification,
        ticket: &PolicyTicket,
        allow_list: &AllowList,
    ) -> Self {
        let mut prohibited: BTreeSet<String> = BTreeSet::new();
        for (risk, mode) in [
            (classification.effective_risk, classification.autonomy_mode),
            (ticket.risk_level, ticket.autonomy_mode),
        ] {
            prohibited.extend(
                allow_list
                    .ceiling_breaches(risk, mode, &classification.paths)
                    .into_iter()
                    .map(str::to_string),
            );
        }
        Self {
            required_roles: classification.required_approval_roles.clone(),
            prohibited_paths: prohibited.into_iter().collect(),
        }
    }

    /// Add roles on top of the change's own obligations.
    pub fn with_required_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.required_roles.extend(
            roles
                .into_iter()
                .map(|r| normalize_role(r.as_ref()))
                .filter(|r| !r.is_empty()),
        );
        self
    }

    pub fn required_roles(&self) -> &BTreeSet<String> {
        &self.required_roles
    }

    /// Production paths that block approval outright. Empty when no ceiling applies.
    pub fn prohibited_paths(&self) -> &[String] {
        &self.prohibited_paths
    }

    /// Required roles with no approver yet.
    pub fn missing_roles(&self, ticket: &PolicyTicket) -> BTreeSet<String> {
        ticket.missing_roles(&self.required_roles)
    }

    /// Apply one approval event.
    pub fn approve(
        &self,
        ticket: &mut PolicyTicket,
        event: &ApprovalEvent,
    ) -> Result<ApprovalOutcome, TicketError> {
        if ticket.status == TicketStatus::Rejected {
            return Err(TicketError::TicketClosed {
                ticket_id: ticket.id.to_string(),
                status: ticket.status.to_string(),
            });
        }

        if !self.prohibited_paths.is_empty() {
            tracing::warn!(
                ticket = %ticket.id,
                identity = %event.identity,
                paths = ?self.prohibited_paths,
                "approval attempted on production code under analysis-only ceiling"
            );
            return Err(TicketError::ProhibitedActionDetected {
                ticket_id: ticket.id.to_string(),
                paths: self.prohibited_paths.clone(),
            });
        }

        let identity = event.identity.trim();
        if ticket.approvals.contains_key(identity) {
            tracing::debug!(
                ticket = %ticket.id,
                identity = %identity,
                "duplicate approval ignored"
            );
            return Ok(ApprovalOutcome::Duplicate {
                status: ticket.status,
            });
        }

        ticket.approvals.insert(
            identity.to_string(),
            ApprovalRecord {
                role: normalize_role(&event.role),
                approved_at: Utc::now(),
            },
        );
        ticket.updated_at = Utc::now();
        let status = self.recompute(ticket)?;
        Ok(ApprovalOutcome::Recorded { status })
    }

    /// Bring the ticket's status in line with its recorded approvals.
    ///
    /// Never moves a terminal ticket.
    pub fn recompute(&self, ticket: &mut PolicyTicket) -> Result<TicketStatus, TicketError> {
        if ticket.status.is_terminal() {
            return Ok(ticket.status);
        }

        let missing = self.missing_roles(ticket);
        let next = if missing.is_empty() {
            TicketStatus::Approved
        } else if missing.len() < self.required_roles.len() {
            TicketStatus::PartiallyApproved
        } else {
            TicketStatus::Open
        };

        if next != ticket.status {
            ticket.transition(next)?;
            tracing::info!(ticket = %ticket.id, status = %next, "ticket status changed");
        }
        Ok(ticket.status)
    }

    /// Reject the ticket. Idempotent for an already rejected ticket.
    ///
    /// Returns `true` if the status changed.
    pub fn reject(
        ticket: &mut PolicyTicket,
        identity: &str,
        reason: &str,
    ) -> Result<bool, TicketError> {
        match ticket.status {
            TicketStatus::Rejected => Ok(false),
            TicketStatus::Approved => Err(TicketError::TicketClosed {
                ticket_id: ticket.id.to_string(),
                status: ticket.status.to_string(),
            }),
            _ => {
                ticket.transition(TicketStatus::Rejected)?;
                ticket.rejection = Some(RejectionRecord {
                    identity: identity.trim().to_string(),
                    reason: reason.to_string(),
                    rejected_at: Utc::now(),
                });
                tracing::info!(ticket = %ticket.id, identity = %identity, "ticket rejected");
                Ok(true)
            }
        }
    }
}
