// linker.rs — Ticket Linker.
//
// Pulls the single ticket reference out of a change description, loads the
// ticket, and checks that it was filed for the change it is attached to:
//
// 1. Exactly one distinct ticket id in the text → else MalformedTicketReference
// 2. Ticket exists in the source → else TicketNotFound
// 3. Ticket domain ∈ changeset's matched domains → else DomainMismatch
// 4. Ticket risk ≥ changeset's effective risk → else RiskLevelMismatch
//
// Step 4 stops a change from being downgraded by filing it under a
// low-risk ticket.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use pce_policy::Classification;
use regex::Regex;

use crate::error::TicketError;
use crate::ticket::{PolicyTicket, TicketId, TICKET_ID_PATTERN};

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\b{}\b", TICKET_ID_PATTERN)).expect("ticket id pattern is valid")
    })
}

/// Where the linker loads tickets from.
pub trait TicketSource {
    fn load_ticket(&self, id: &TicketId) -> Result<Option<PolicyTicket>, TicketError>;
}

impl TicketSource for BTreeMap<TicketId, PolicyTicket> {
    fn load_ticket(&self, id: &TicketId) -> Result<Option<PolicyTicket>, TicketError> {
        Ok(self.get(id).cloned())
    }
}

/// Extract the one ticket id referenced in free text.
///
/// Repeating the same id is fine; two different ids are ambiguous and fail.
pub fn extract_reference(text: &str) -> Result<TicketId, TicketError> {
    let ids: BTreeSet<&str> = reference_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect();

    let mut iter = ids.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(TicketError::MalformedTicketReference {
            reason: "no ticket reference (PT-<DOMAIN>-<YYYY>-<NNN>) found in description"
                .to_string(),
        }),
        (Some(id), None) => TicketId::parse(id),
        (Some(_), Some(_)) => Err(TicketError::MalformedTicketReference {
            reason: format!(
                "ambiguous ticket reference: {} distinct ids found ({})",
                ids.len(),
                ids.iter().copied().collect::<Vec<_>>().join(", ")
            ),
        }),
    }
}

/// Stateless linker over a ticket source.
pub struct TicketLinker;

impl TicketLinker {
    /// Extract, load, and validate the ticket referenced by `description`.
    pub fn link(
        source: &dyn TicketSource,
        description: &str,
        classification: &Classification,
    ) -> Result<PolicyTicket, TicketError> {
        let id = extract_reference(description)?;
        let ticket = source
            .load_ticket(&id)?
            .ok_or_else(|| TicketError::TicketNotFound { id: id.to_string() })?;
        Self::validate(&ticket, classification)?;
        tracing::debug!(ticket = %ticket.id, domain = %ticket.domain, "ticket linked");
        Ok(ticket)
    }

    /// Check a loaded ticket against the changeset classification.
    pub fn validate(
        ticket: &PolicyTicket,
        classification: &Classification,
    ) -> Result<(), TicketError> {
        if !classification
            .matched_domains
            .iter()
            .any(|d| ticket.is_filed_under(d))
        {
            return Err(TicketError::DomainMismatch {
                ticket_id: ticket.id.to_string(),
                ticket_domain: ticket.domain.clone(),
                matched: classification
                    .matched_domains
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        if ticket.risk_level < classification.effective_risk {
            return Err(TicketError::RiskLevelMismatch {
                ticket_id: ticket.id.to_string(),
                declared: ticket.risk_level,
                effective: classification.effective_risk,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pce_policy::{AutonomyMode, DomainRegistry, RiskLevel};

    fn registry() -> DomainRegistry {
        DomainRegistry::from_yaml_str(
            r#"
rules:
  - domain: billing
    pattern: "backend/billing/**"
    risk_level: critical
    autonomy_mode: analysis_only
  - domain: auth
    pattern: "backend/auth/**"
    risk_level: high
    autonomy_mode: supervised
"#,
        )
        .unwrap()
    }

    fn tickets() -> BTreeMap<TicketId, PolicyTicket> {
        let mut map = BTreeMap::new();
        for (id, domain, risk) in [
            ("PT-AUTH-2026-001", "auth", RiskLevel::High),
            ("PT-AUTH-2026-002", "auth", RiskLevel::Low),
            ("PT-BILLING-2026-001", "billing", RiskLevel::Critical),
        ] {
            let id = TicketId::parse(id).unwrap();
            map.insert(
                id.clone(),
                PolicyTicket::new(id, domain, risk, AutonomyMode::Supervised),
            );
        }
        map
    }

    #[test]
    fn extracts_single_reference() {
        let id = extract_reference("Fix token refresh (PT-AUTH-2026-001)").unwrap();
        assert_eq!(id.as_str(), "PT-AUTH-2026-001");
    }

    #[test]
    fn repeated_same_reference_is_not_ambiguous() {
        let id = extract_reference("PT-AUTH-2026-001\n\nRefs PT-AUTH-2026-001").unwrap();
        assert_eq!(id.as_str(), "PT-AUTH-2026-001");
    }

    #[test]
    fn two_distinct_references_are_ambiguous() {
        let err = extract_reference("PT-AUTH-2026-001 and PT-BILLING-2026-001").unwrap_err();
        match err {
            TicketError::MalformedTicketReference { reason } => {
                assert!(reason.contains("ambiguous"));
            }
            other => panic!("expected MalformedTicketReference, got {:?}", other),
        }
    }

    #[test]
    fn missing_reference_is_malformed() {
        assert!(matches!(
            extract_reference("just a refactor"),
            Err(TicketError::MalformedTicketReference { .. })
        ));
    }

    #[test]
    fn reference_must_stand_alone() {
        // Embedded in a longer token: not a reference.
        assert!(extract_reference("XPT-AUTH-2026-0012").is_err());
    }

    #[test]
    fn link_validates_domain_and_risk() {
        let reg = registry();
        let classification = reg.resolve(&["backend/auth/login.py"]).unwrap();
        let ticket =
            TicketLinker::link(&tickets(), "PT-AUTH-2026-001: login fix", &classification)
                .unwrap();
        assert_eq!(ticket.domain, "auth");
    }

    #[test]
    fn link_reports_unknown_ticket() {
        let reg = registry();
        let classification = reg.resolve(&["backend/auth/login.py"]).unwrap();
        assert!(matches!(
            TicketLinker::link(&tickets(), "PT-AUTH-2026-999", &classification),
            Err(TicketError::TicketNotFound { .. })
        ));
    }

    #[test]
    fn link_rejects_risk_downgrade() {
        let reg = registry();
        let classification = reg.resolve(&["backend/auth/login.py"]).unwrap();
        match TicketLinker::link(&tickets(), "PT-AUTH-2026-002", &classification) {
            Err(TicketError::RiskLevelMismatch {
                declared,
                effective,
                ..
            }) => {
                assert_eq!(declared, RiskLevel::Low);
                assert_eq!(effective, RiskLevel::High);
            }
            other => panic!("expected RiskLevelMismatch, got {:?}", other),
        }
    }

    #[test]
    fn link_rejects_ticket_from_other_domain() {
        let reg = registry();
        let classification = reg.resolve(&["backend/auth/login.py"]).unwrap();
        assert!(matches!(
            TicketLinker::link(&tickets(), "PT-BILLING-2026-001", &classification),
            Err(TicketError::DomainMismatch { .. })
        ));
    }

    #[test]
    fn higher_declared_risk_is_accepted() {
        let reg = registry();
        let classification = reg.resolve(&["backend/auth/login.py"]).unwrap();
        let mut ticket = tickets()
            .remove(&TicketId::parse("PT-AUTH-2026-001").unwrap())
            .unwrap();
        ticket.risk_level = RiskLevel::Critical;
        assert!(TicketLinker::validate(&ticket, &classification).is_ok());
    }
}
