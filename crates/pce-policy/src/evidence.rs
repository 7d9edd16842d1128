// evidence.rs — Evidence Validator.
//
// Given phase-tagged evidence requirements and a completion map, report what
// is still outstanding for the phase being gated. Earlier phases must be
// finished before a later one can pass, but only for High and Critical risk;
// below that, earlier-phase gaps are reported as advisory and logged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::risk::{EvidencePhase, EvidenceRequirement, RiskLevel};

/// Outcome of validating evidence for one gate phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceReport {
    /// The phase that was evaluated.
    pub phase: EvidencePhase,

    /// Items that block this phase: outstanding items of the phase itself,
    /// followed by outstanding earlier-phase items when ordering is enforced.
    pub missing: Vec<String>,

    /// Outstanding earlier-phase items that do not block (Low/Medium risk).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisory: Vec<String>,
}

impl EvidenceReport {
    /// Whether the phase gate can open as far as evidence is concerned.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Stateless evidence checker.
pub struct EvidenceValidator;

impl EvidenceValidator {
    /// Whether a single item is recorded as complete. Absent means incomplete.
    pub fn is_item_complete(completed: &BTreeMap<String, bool>, id: &str) -> bool {
        completed.get(id).copied().unwrap_or(false)
    }

    /// Evaluate `required` against `completed` for `phase` at `risk`.
    pub fn validate(
        required: &[EvidenceRequirement],
        completed: &BTreeMap<String, bool>,
        phase: EvidencePhase,
        risk: RiskLevel,
    ) -> EvidenceReport {
        let outstanding = |pred: &dyn Fn(EvidencePhase) -> bool| -> Vec<String> {
            let mut ids: Vec<String> = Vec::new();
            for req in required {
                if pred(req.phase)
                    && !Self::is_item_complete(completed, &req.id)
                    && !ids.contains(&req.id)
                {
                    ids.push(req.id.clone());
                }
            }
            ids
        };

        let mut missing = outstanding(&|p| p == phase);
        let earlier = outstanding(&|p| p < phase);

        let mut advisory = Vec::new();
        if !earlier.is_empty() {
            if risk.enforces_phase_order() {
                tracing::debug!(
                    %phase,
                    %risk,
                    items = ?earlier,
                    "earlier-phase evidence outstanding; phase cannot complete"
                );
                missing.extend(earlier);
            } else {
                tracing::warn!(
                    %phase,
                    %risk,
                    items = ?earlier,
                    "earlier-phase evidence outstanding (advisory at this risk level)"
                );
                advisory = earlier;
            }
        }

        EvidenceReport {
            phase,
            missing,
            advisory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reqs() -> Vec<EvidenceRequirement> {
        vec![
            EvidenceRequirement::new("threat_model", EvidencePhase::PreDevelopment),
            EvidenceRequirement::new("unit_tests", EvidencePhase::PreMerge),
            EvidenceRequirement::new("security_review", EvidencePhase::PreMerge),
            EvidenceRequirement::new("canary_plan", EvidencePhase::PreProduction),
        ]
    }

    fn done(items: &[(&str, bool)]) -> BTreeMap<String, bool> {
        items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn reports_only_requested_phase_items() {
        let report = EvidenceValidator::validate(
            &reqs(),
            &done(&[("threat_model", true), ("unit_tests", true)]),
            EvidencePhase::PreMerge,
            RiskLevel::High,
        );
        assert_eq!(report.missing, vec!["security_review"]);
        assert!(report.advisory.is_empty());
        assert!(!report.is_complete());
    }

    #[test]
    fn later_phases_are_ignored() {
        let report = EvidenceValidator::validate(
            &reqs(),
            &done(&[("threat_model", true)]),
            EvidencePhase::PreDevelopment,
            RiskLevel::Critical,
        );
        assert!(report.is_complete());
    }

    #[test]
    fn earlier_phase_blocks_for_high_risk() {
        let report = EvidenceValidator::validate(
            &reqs(),
            &done(&[("unit_tests", true), ("security_review", true)]),
            EvidencePhase::PreMerge,
            RiskLevel::High,
        );
        assert_eq!(report.missing, vec!["threat_model"]);
    }

    #[test]
    fn earlier_phase_is_advisory_for_medium_risk() {
        let report = EvidenceValidator::validate(
            &reqs(),
            &done(&[("unit_tests", true), ("security_review", true)]),
            EvidencePhase::PreMerge,
            RiskLevel::Medium,
        );
        assert!(report.is_complete());
        assert_eq!(report.advisory, vec!["threat_model"]);
    }

    #[test]
    fn false_entries_count_as_incomplete() {
        let report = EvidenceValidator::validate(
            &reqs(),
            &done(&[("threat_model", true), ("unit_tests", false), ("security_review", true)]),
            EvidencePhase::PreMerge,
            RiskLevel::Low,
        );
        assert_eq!(report.missing, vec!["unit_tests"]);
    }

    #[test]
    fn no_requirements_is_complete() {
        let report = EvidenceValidator::validate(
            &[],
            &BTreeMap::new(),
            EvidencePhase::PreProduction,
            RiskLevel::Critical,
        );
        assert!(report.is_complete());
    }
}
