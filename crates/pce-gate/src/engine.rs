// engine.rs — Gate decision engine.
//
// Every proposed change passes through `evaluate()`, which checks:
//
// 1. Classify the changed paths              → error: single-cause Block
// 2. Link the referenced ticket               → error: single-cause Block
// 3. Ticket not Rejected                      → else TicketRejected
// 4. Critical + AnalysisOnly ceiling          → else ProhibitedActionDetected
// 5. Paths inside the ticket's scope          → else ScopeViolation
// 6. Approvals (skipped for Full autonomy)    → else InsufficientApprovals
// 7. Evidence for the requested phase         → else IncompleteEvidence
//
// Steps 3-7 all run and all failures are reported together. Allow only when
// none of them failed.
//
// Evaluation is pure: request approvals and evidence are applied to a copy
// of the ticket, never written back. Persisting them is the caller's job.

use std::collections::BTreeMap;

use pce_policy::{
    Classification, DomainRegistry, EvidencePhase, EvidenceRequirement, EvidenceValidator,
};
use pce_ticket::{ApprovalResolver, PolicyTicket, TicketLinker, TicketSource, TicketStatus};

use crate::decision::{GateDecision, Violation, ViolationKind};
use crate::request::EvaluationRequest;

/// Evaluates change requests against one registry snapshot and a ticket source.
pub struct GateEngine<'a> {
    registry: &'a DomainRegistry,
    tickets: &'a dyn TicketSource,
    default_phase: EvidencePhase,
}

impl<'a> GateEngine<'a> {
    pub fn new(registry: &'a DomainRegistry, tickets: &'a dyn TicketSource) -> Self {
        Self {
            registry,
            tickets,
            default_phase: EvidencePhase::default(),
        }
    }

    /// Phase used for requests that do not name one.
    pub fn with_default_phase(mut self, phase: EvidencePhase) -> Self {
        self.default_phase = phase;
        self
    }

    /// Render a verdict for one change.
    pub fn evaluate(&self, request: &EvaluationRequest) -> GateDecision {
        let phase = request.phase.unwrap_or(self.default_phase);
        let mut decision = GateDecision::new(phase);

        // Step 1: classification.
        let classification = match self.registry.resolve(&request.changed_paths) {
            Ok(c) => c,
            Err(e) => {
                decision.record("classify", format!("failed: {}", e), true);
                decision.violate(e.into());
                return self.conclude(decision);
            }
        };
        decision.record(
            "classify",
            format!(
                "passed: risk {} across [{}]",
                classification.effective_risk,
                joined(classification.matched_domains.iter())
            ),
            false,
        );
        decision.effective_risk = Some(classification.effective_risk);
        decision.autonomy_mode = Some(classification.autonomy_mode);
        decision.matched_domains = classification.matched_domains.iter().cloned().collect();

        // Step 2: ticket linking.
        let mut ticket =
            match TicketLinker::link(self.tickets, &request.description_text, &classification) {
                Ok(t) => t,
                Err(e) => {
                    decision.record("link_ticket", format!("failed: {}", e), true);
                    decision.violate(e.into());
                    return self.conclude(decision);
                }
            };
        decision.record("link_ticket", format!("passed: {}", ticket.id), false);
        decision.ticket_id = Some(ticket.id.to_string());

        let mode = classification.autonomy_mode.max(ticket.autonomy_mode);
        decision.autonomy_mode = Some(mode);

        // Step 3: rejected tickets can never pass.
        let rejected = ticket.status == TicketStatus::Rejected;
        if rejected {
            let by = ticket
                .rejection
                .as_ref()
                .map(|r| format!(" by {}: {}", r.identity, r.reason))
                .unwrap_or_default();
            decision.record("ticket_status", "failed: rejected", false);
            decision.violate(Violation::new(
                ViolationKind::TicketRejected,
                format!("ticket {} was rejected{}", ticket.id, by),
            ));
        } else {
            decision.record("ticket_status", format!("passed: {}", ticket.status), false);
        }

        // Step 4: the analysis-only ceiling.
        let resolver =
            ApprovalResolver::for_change(&classification, &ticket, self.registry.allow_list());
        let ceiling = !resolver.prohibited_paths().is_empty();
        if ceiling {
            decision.record("analysis_only_ceiling", "failed: production paths present", false);
            decision.violate(Violation::new(
                ViolationKind::ProhibitedActionDetected,
                format!(
                    "ticket {} is critical/analysis-only; production code cannot be merged: {}",
                    ticket.id,
                    joined(resolver.prohibited_paths().iter())
                ),
            ));
        } else {
            decision.record("analysis_only_ceiling", "passed", false);
        }

        // Step 5: ticket scope.
        self.check_scope(&ticket, &classification, &mut decision);

        // Step 6: approvals.
        if !mode.requires_human_approval() {
            decision.record("approvals", "skipped: full autonomy", false);
        } else if ceiling {
            decision.record("approvals", "skipped: analysis-only ceiling", false);
        } else if rejected {
            decision.record("approvals", "skipped: ticket rejected", false);
        } else {
            self.check_approvals(&resolver, &mut ticket, request, &mut decision);
        }
        decision.ticket_status = Some(ticket.status);

        // Step 7: evidence.
        self.check_evidence(&ticket, &classification, request, phase, &mut decision);

        self.conclude(decision)
    }

    fn check_scope(
        &self,
        ticket: &PolicyTicket,
        classification: &Classification,
        decision: &mut GateDecision,
    ) {
        match ticket.scope_violations(&classification.paths) {
            Ok(violations) if violations.is_empty() => decision.record("scope", "passed", false),
            Ok(violations) => {
                decision.record(
                    "scope",
                    format!("failed: {} path(s) out of scope", violations.len()),
                    false,
                );
                for v in violations {
                    decision.violate(Violation::new(
                        ViolationKind::ScopeViolation,
                        format!("{} is out of scope for ticket {}: {}", v.path, ticket.id, v.reason),
                    ));
                }
            }
            Err(e) => {
                decision.record("scope", format!("failed: {}", e), false);
                decision.violate(e.into());
            }
        }
    }

    fn check_approvals(
        &self,
        resolver: &ApprovalResolver,
        ticket: &mut PolicyTicket,
        request: &EvaluationRequest,
        decision: &mut GateDecision,
    ) {
        for event in &request.approval_events {
            if let Err(e) = resolver.approve(ticket, event) {
                decision.violate(e.into());
            }
        }
        // Stored approvals may already cover roles this change requires.
        if let Err(e) = resolver.recompute(ticket) {
            decision.violate(e.into());
        }

        // A ticket approved under an older rule set still has to cover
        // every role the current change requires.
        let missing: Vec<String> = resolver.missing_roles(ticket).into_iter().collect();
        if ticket.status == TicketStatus::Approved && missing.is_empty() {
            decision.record("approvals", "passed", false);
            return;
        }

        decision.record(
            "approvals",
            format!("failed: {} missing [{}]", ticket.status, missing.join(", ")),
            false,
        );
        decision.violate(Violation::new(
            ViolationKind::InsufficientApprovals,
            format!(
                "ticket {} is {}; missing approval from: {}",
                ticket.id,
                ticket.status,
                missing.join(", ")
            ),
        ));
        decision.missing_approval_roles = missing;
    }

    fn check_evidence(
        &self,
        ticket: &PolicyTicket,
        classification: &Classification,
        request: &EvaluationRequest,
        phase: EvidencePhase,
        decision: &mut GateDecision,
    ) {
        let mut required: Vec<EvidenceRequirement> = classification.required_evidence.clone();
        for req in &ticket.required_evidence {
            if !required.iter().any(|r| r.id == req.id) {
                required.push(req.clone());
            }
        }

        let mut completed: BTreeMap<String, bool> = ticket.evidence.clone();
        completed.extend(request.evidence_state.iter().map(|(k, v)| (k.clone(), *v)));

        let risk = ticket.risk_level.max(classification.effective_risk);
        let report = EvidenceValidator::validate(&required, &completed, phase, risk);
        decision.advisory_evidence_ids = report.advisory.clone();

        if report.is_complete() {
            decision.record("evidence", format!("passed: {}", phase), false);
            return;
        }

        decision.record(
            "evidence",
            format!("failed: {} item(s) outstanding", report.missing.len()),
            false,
        );
        decision.violate(Violation::new(
            ViolationKind::IncompleteEvidence,
            format!(
                "evidence incomplete for {}: {}",
                phase,
                report.missing.join(", ")
            ),
        ));
        decision.missing_evidence_ids = report.missing;
    }

    fn conclude(&self, decision: GateDecision) -> GateDecision {
        let decision = decision.finish();
        tracing::info!(
            verdict = %decision.verdict,
            ticket = decision.ticket_id.as_deref().unwrap_or("-"),
            phase = %decision.phase,
            violations = decision.violations.len(),
            "gate decision"
        );
        decision
    }
}

fn joined<'s>(items: impl Iterator<Item = &'s String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pce_policy::{AutonomyMode, RiskLevel};
    use pce_ticket::TicketId;

    fn registry() -> DomainRegistry {
        DomainRegistry::from_yaml_str(
            r#"
rules:
  - domain: auth
    pattern: "backend/auth/**"
    risk_level: high
    autonomy_mode: supervised
    required_approval_roles: [tech_lead, security_lead]
    required_evidence:
      - { id: threat_model, phase: pre_development }
      - security_review
  - domain: web
    pattern: "frontend/**"
    risk_level: low
    autonomy_mode: full
    required_evidence: [unit_tests]
"#,
        )
        .unwrap()
    }

    fn tickets(ticket: PolicyTicket) -> BTreeMap<TicketId, PolicyTicket> {
        let mut map = BTreeMap::new();
        map.insert(ticket.id.clone(), ticket);
        map
    }

    fn auth_ticket() -> PolicyTicket {
        PolicyTicket::new(
            TicketId::parse("PT-AUTH-2026-001").unwrap(),
            "auth",
            RiskLevel::High,
            AutonomyMode::Supervised,
        )
    }

    #[test]
    fn reports_every_deficiency_together() {
        let registry = registry();
        let source = tickets(auth_ticket());
        let engine = GateEngine::new(&registry, &source);

        let request = EvaluationRequest::new(["backend/auth/login.py"], "PT-AUTH-2026-001")
            .with_approval("ana", "tech_lead");
        let decision = engine.evaluate(&request);

        assert!(!decision.is_allowed());
        assert_eq!(
            decision.violation_kinds(),
            vec![
                ViolationKind::InsufficientApprovals,
                ViolationKind::IncompleteEvidence
            ]
        );
        assert_eq!(decision.missing_approval_roles, vec!["security_lead"]);
        // High risk enforces phase order: the pre-development item blocks too.
        assert_eq!(
            decision.missing_evidence_ids,
            vec!["security_review", "threat_model"]
        );
        assert_eq!(decision.ticket_status, Some(TicketStatus::PartiallyApproved));
    }

    #[test]
    fn allows_when_approved_and_evidenced() {
        let registry = registry();
        let source = tickets(auth_ticket());
        let engine = GateEngine::new(&registry, &source);

        let request = EvaluationRequest::new(["backend/auth/login.py"], "Fixes PT-AUTH-2026-001")
            .with_approval("ana", "Tech Lead")
            .with_approval("bo", "security-lead")
            .with_evidence("threat_model", true)
            .with_evidence("security_review", true);
        let decision = engine.evaluate(&request);

        assert!(decision.is_allowed(), "reasons: {:?}", decision.reasons);
        assert_eq!(decision.ticket_status, Some(TicketStatus::Approved));
        assert!(decision.checks.iter().all(|c| !c.terminal));
    }

    #[test]
    fn evaluation_does_not_mutate_the_source() {
        let registry = registry();
        let source = tickets(auth_ticket());
        let engine = GateEngine::new(&registry, &source);

        let request = EvaluationRequest::new(["backend/auth/login.py"], "PT-AUTH-2026-001")
            .with_approval("ana", "tech_lead");
        engine.evaluate(&request);

        let stored = &source[&TicketId::parse("PT-AUTH-2026-001").unwrap()];
        assert!(stored.approvals.is_empty());
        assert_eq!(stored.status, TicketStatus::Open);
    }

    #[test]
    fn full_autonomy_skips_approvals() {
        let registry = registry();
        let ticket = PolicyTicket::new(
            TicketId::parse("PT-WEB-2026-004").unwrap(),
            "web",
            RiskLevel::Low,
            AutonomyMode::Full,
        );
        let source = tickets(ticket);
        let engine = GateEngine::new(&registry, &source);

        let request = EvaluationRequest::new(["frontend/app.tsx"], "PT-WEB-2026-004")
            .with_evidence("unit_tests", true);
        let decision = engine.evaluate(&request);

        assert!(decision.is_allowed(), "reasons: {:?}", decision.reasons);
        assert!(decision
            .checks
            .iter()
            .any(|c| c.check == "approvals" && c.outcome.starts_with("skipped")));
    }

    #[test]
    fn ticket_mode_can_tighten_the_change_mode() {
        let registry = registry();
        let ticket = PolicyTicket::new(
            TicketId::parse("PT-WEB-2026-005").unwrap(),
            "web",
            RiskLevel::Low,
            AutonomyMode::Supervised,
        );
        let source = tickets(ticket);
        let engine = GateEngine::new(&registry, &source);

        let request = EvaluationRequest::new(["frontend/app.tsx"], "PT-WEB-2026-005")
            .with_evidence("unit_tests", true);
        let decision = engine.evaluate(&request);

        // No roles are required, so the supervised ticket approves itself.
        assert_eq!(decision.autonomy_mode, Some(AutonomyMode::Supervised));
        assert!(decision.is_allowed(), "reasons: {:?}", decision.reasons);
    }

    #[test]
    fn unknown_path_is_single_cause() {
        let registry = registry();
        let source = tickets(auth_ticket());
        let engine = GateEngine::new(&registry, &source);

        let decision =
            engine.evaluate(&EvaluationRequest::new(["infra/main.tf"], "PT-AUTH-2026-001"));

        assert_eq!(decision.violation_kinds(), vec![ViolationKind::UnknownDomain]);
        assert!(decision.effective_risk.is_none());
        assert!(decision.checks.last().map(|c| c.terminal).unwrap_or(false));
    }

    #[test]
    fn rejected_ticket_blocks() {
        let registry = registry();
        let mut ticket = auth_ticket();
        ApprovalResolver::reject(&mut ticket, "sec", "scope too wide").unwrap();
        let source = tickets(ticket);
        let engine = GateEngine::new(&registry, &source);

        let request = EvaluationRequest::new(["backend/auth/login.py"], "PT-AUTH-2026-001")
            .with_approval("ana", "tech_lead")
            .with_evidence("threat_model", true)
            .with_evidence("security_review", true);
        let decision = engine.evaluate(&request);

        assert_eq!(decision.violation_kinds(), vec![ViolationKind::TicketRejected]);
        assert!(decision.reasons[0].contains("scope too wide"));
    }

    #[test]
    fn scope_violations_accumulate() {
        let registry = registry();
        let ticket = auth_ticket()
            .with_allowed_scope(vec!["backend/auth/login*".to_string()])
            .with_prohibited_scope(vec!["backend/auth/keys/**".to_string()]);
        let source = tickets(ticket);
        let engine = GateEngine::new(&registry, &source);

        let request = EvaluationRequest::new(
            [
                "backend/auth/login.py",
                "backend/auth/session.py",
                "backend/auth/keys/jwt.py",
            ],
            "PT-AUTH-2026-001",
        );
        let decision = engine.evaluate(&request);

        let scope = decision
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::ScopeViolation)
            .count();
        assert_eq!(scope, 2);
        assert!(decision.has_violation(ViolationKind::InsufficientApprovals));
    }

    #[test]
    fn request_phase_overrides_default() {
        let registry = registry();
        let source = tickets(auth_ticket());
        let engine =
            GateEngine::new(&registry, &source).with_default_phase(EvidencePhase::PreProduction);

        let implicit = engine.evaluate(&EvaluationRequest::new(
            ["backend/auth/login.py"],
            "PT-AUTH-2026-001",
        ));
        assert_eq!(implicit.phase, EvidencePhase::PreProduction);

        let explicit = engine.evaluate(
            &EvaluationRequest::new(["backend/auth/login.py"], "PT-AUTH-2026-001")
                .with_phase(EvidencePhase::PreDevelopment),
        );
        assert_eq!(explicit.phase, EvidencePhase::PreDevelopment);
        assert_eq!(explicit.missing_evidence_ids, vec!["threat_model"]);
    }
}
