// request.rs — Evaluation request.
//
// Everything the repository host knows about one proposed change: the
// touched paths, the description carrying the ticket reference, reviewer
// approvals delivered with the event, and checklist state. Field names
// accept both snake_case and the camelCase used by webhook payloads.

use std::collections::BTreeMap;

use pce_policy::EvidencePhase;
use pce_ticket::ApprovalEvent;
use serde::{Deserialize, Serialize};

/// One gate evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationRequest {
    #[serde(alias = "changedPaths")]
    pub changed_paths: Vec<String>,

    #[serde(default, alias = "descriptionText")]
    pub description_text: String,

    /// Approvals delivered with this event, applied on top of those already
    /// recorded on the ticket.
    #[serde(default, alias = "approvalEvents")]
    pub approval_events: Vec<ApprovalEvent>,

    /// Evidence completion overriding the ticket's recorded state per item.
    #[serde(default, alias = "evidenceState")]
    pub evidence_state: BTreeMap<String, bool>,

    /// Gate phase. When absent the engine's default phase is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<EvidencePhase>,
}

impl EvaluationRequest {
    pub fn new<I, S>(paths: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            changed_paths: paths.into_iter().map(Into::into).collect(),
            description_text: description.into(),
            ..Default::default()
        }
    }

    pub fn with_approval(mut self, identity: impl Into<String>, role: impl Into<String>) -> Self {
        self.approval_events.push(ApprovalEvent::new(identity, role));
        self
    }

    pub fn with_evidence(mut self, id: impl Into<String>, complete: bool) -> Self {
        self.evidence_state.insert(id.into(), complete);
        self
    }

    pub fn with_phase(mut self, phase: EvidencePhase) -> Self {
        self.phase = Some(phase);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_webhook_field_names() {
        let json = r#"{
            "changedPaths": ["backend/admin/categories.py"],
            "descriptionText": "Implements PT-CATEGORY-001",
            "approvalEvents": [{"identity": "ana", "role": "tech_lead"}],
            "evidenceState": {"CRUD_tests": true},
            "phase": "merge"
        }"#;
        let request: EvaluationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.changed_paths, vec!["backend/admin/categories.py"]);
        assert_eq!(request.approval_events[0].identity, "ana");
        assert_eq!(request.evidence_state.get("CRUD_tests"), Some(&true));
        assert_eq!(request.phase, Some(EvidencePhase::PreMerge));
    }

    #[test]
    fn optional_fields_default() {
        let request: EvaluationRequest =
            serde_json::from_str(r#"{"changed_paths": ["a.py"]}"#).unwrap();
        assert!(request.description_text.is_empty());
        assert!(request.approval_events.is_empty());
        assert!(request.phase.is_none());
    }
}
