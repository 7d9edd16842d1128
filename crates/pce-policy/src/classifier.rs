// classifier.rs — Change Classifier.
//
// Maps a set of changed paths to the domains they belong to and derives the
// changeset-level obligations:
//
// 1. Normalize every path; reject traversal.
// 2. Every path must match at least one rule (UnknownDomain otherwise).
// 3. Effective risk = max risk over every matched rule of every path.
// 4. Obligations (roles, evidence) = union over the rules AT that max level.
//    Lower-level matches are kept as matched domains for traceability only.
// 5. Autonomy mode = the most restrictive mode among the max-level rules.
//
// Paths are sorted and deduplicated first and rules are walked in declaration
// order, so the result never depends on the order of the input paths.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::registry::DomainRegistry;
use crate::risk::{AutonomyMode, EvidencePhase, EvidenceRequirement, RiskLevel};

/// The changeset-level result of classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    /// Highest risk level among all matched rules.
    pub effective_risk: RiskLevel,

    /// Most restrictive autonomy mode among the rules at `effective_risk`.
    pub autonomy_mode: AutonomyMode,

    /// Every domain any path matched, at any level.
    pub matched_domains: BTreeSet<String>,

    /// Domains whose rules sit at `effective_risk` and contribute obligations.
    pub obligating_domains: BTreeSet<String>,

    /// Union of approval roles from the rules at `effective_risk`.
    pub required_approval_roles: BTreeSet<String>,

    /// Union of evidence items from the rules at `effective_risk`, in rule
    /// declaration order, first occurrence wins.
    pub required_evidence: Vec<EvidenceRequirement>,

    /// Normalized, sorted, deduplicated changed paths.
    pub paths: Vec<String>,

    /// Domains matched by each path.
    pub path_domains: BTreeMap<String, BTreeSet<String>>,
}

impl Classification {
    /// Evidence ids required for a single phase.
    pub fn evidence_for_phase(&self, phase: EvidencePhase) -> Vec<&str> {
        self.required_evidence
            .iter()
            .filter(|r| r.phase == phase)
            .map(|r| r.id.as_str())
            .collect()
    }
}

/// Canonical form of an approval role name: trimmed, lowercase, with spaces
/// and dashes folded to underscores ("Tech Lead" and "tech-lead" are both
/// `tech_lead`).
pub fn normalize_role(role: &str) -> String {
    role.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Normalize a repository-relative path for matching.
///
/// Converts backslashes, strips leading `./` and `/`, collapses repeated
/// separators, and rejects any `..` component.
pub fn normalize_path(raw: &str) -> Result<String, ClassifyError> {
    let unified = raw.trim().replace('\\', "/");
    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(ClassifyError::PathTraversal {
                    path: raw.to_string(),
                })
            }
            p => parts.push(p),
        }
    }
    Ok(parts.join("/"))
}

/// Classify a change set against a registry snapshot.
pub fn classify<S: AsRef<str>>(
    registry: &DomainRegistry,
    paths: &[S],
) -> Result<Classification, ClassifyError> {
    let mut normalized = BTreeSet::new();
    for raw in paths {
        let path = normalize_path(raw.as_ref())?;
        if !path.is_empty() {
            normalized.insert(path);
        }
    }
    if normalized.is_empty() {
        return Err(ClassifyError::EmptyChangeSet);
    }

    let mut matched_rules = BTreeSet::new();
    let mut path_domains = BTreeMap::new();
    for path in &normalized {
        let indices = registry.matching_rules(path);
        if indices.is_empty() {
            tracing::debug!(path = %path, "path matches no domain");
            return Err(ClassifyError::UnknownDomain { path: path.clone() });
        }
        let domains: BTreeSet<String> = indices
            .iter()
            .filter_map(|&i| registry.rule(i))
            .map(|r| r.domain.clone())
            .collect();
        tracing::debug!(path = %path, ?domains, "path classified");
        path_domains.insert(path.clone(), domains);
        matched_rules.extend(indices);
    }

    let rules: Vec<_> = matched_rules
        .iter()
        .filter_map(|&i| registry.rule(i))
        .collect();

    // `matched_rules` is non-empty because every path matched at least once.
    let effective_risk = rules
        .iter()
        .map(|r| r.risk_level)
        .max()
        .unwrap_or(RiskLevel::Critical);

    let mut matched_domains = BTreeSet::new();
    let mut obligating_domains = BTreeSet::new();
    let mut required_approval_roles = BTreeSet::new();
    let mut required_evidence: Vec<EvidenceRequirement> = Vec::new();
    let mut autonomy_mode = AutonomyMode::Full;

    for rule in &rules {
        matched_domains.insert(rule.domain.clone());
        if rule.risk_level != effective_risk {
            continue;
        }
        obligating_domains.insert(rule.domain.clone());
        autonomy_mode = autonomy_mode.max(rule.autonomy_mode);
        required_approval_roles.extend(
            rule.required_approval_roles
                .iter()
                .map(|r| normalize_role(r))
                .filter(|r| !r.is_empty()),
        );
        for req in &rule.required_evidence {
            if !required_evidence.iter().any(|existing| existing.id == req.id) {
                required_evidence.push(req.clone());
            }
        }
    }

    Ok(Classification {
        effective_risk,
        autonomy_mode,
        matched_domains,
        obligating_domains,
        required_approval_roles,
        required_evidence,
        paths: normalized.into_iter().collect(),
        path_domains,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DomainRule;

    fn rule(
        domain: &str,
        pattern: &str,
        risk: RiskLevel,
        mode: AutonomyMode,
        roles: &[&str],
        evidence: &[(&str, EvidencePhase)],
    ) -> DomainRule {
        DomainRule {
            domain: domain.to_string(),
            pattern: pattern.to_string(),
            risk_level: risk,
            autonomy_mode: mode,
            required_approval_roles: roles.iter().map(|r| r.to_string()).collect(),
            required_evidence: evidence
                .iter()
                .map(|(id, phase)| EvidenceRequirement::new(*id, *phase))
                .collect(),
        }
    }

    fn registry() -> DomainRegistry {
        DomainRegistry::from_rules(vec![
            rule(
                "catalog",
                "backend/admin/**",
                RiskLevel::Low,
                AutonomyMode::Full,
                &[],
                &[("CRUD_tests", EvidencePhase::PreMerge)],
            ),
            rule(
                "auth",
                "backend/auth/**",
                RiskLevel::High,
                AutonomyMode::Supervised,
                &["tech_lead", "security_lead"],
                &[
                    ("threat_model", EvidencePhase::PreDevelopment),
                    ("security_review", EvidencePhase::PreMerge),
                ],
            ),
            rule(
                "sessions",
                "backend/auth/session*",
                RiskLevel::High,
                AutonomyMode::Checkpointed,
                &["tech_lead", "product_owner"],
                &[("security_review", EvidencePhase::PreMerge), ("load_test", EvidencePhase::PreProduction)],
            ),
            rule(
                "backend",
                "backend/**",
                RiskLevel::Medium,
                AutonomyMode::Checkpointed,
                &["reviewer"],
                &[("unit_tests", EvidencePhase::PreMerge)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn single_low_path() {
        let c = classify(&registry(), &["backend/admin/categories.py"]).unwrap();
        // backend/** (medium) also matches, so medium wins.
        assert_eq!(c.effective_risk, RiskLevel::Medium);
        assert_eq!(
            c.matched_domains,
            BTreeSet::from(["backend".to_string(), "catalog".to_string()])
        );
        assert_eq!(c.obligating_domains, BTreeSet::from(["backend".to_string()]));
        assert_eq!(c.required_approval_roles, BTreeSet::from(["reviewer".to_string()]));
    }

    #[test]
    fn highest_risk_wins_and_lower_levels_add_no_obligations() {
        let c = classify(
            &registry(),
            &["backend/admin/categories.py", "backend/auth/tokens.py"],
        )
        .unwrap();
        assert_eq!(c.effective_risk, RiskLevel::High);
        assert!(c.matched_domains.contains("catalog"));
        assert!(c.matched_domains.contains("backend"));
        assert!(!c.required_approval_roles.contains("reviewer"));
        assert!(!c.required_evidence.iter().any(|r| r.id == "CRUD_tests"));
        assert_eq!(c.autonomy_mode, AutonomyMode::Supervised);
    }

    #[test]
    fn ties_at_max_level_merge_requirements() {
        let c = classify(&registry(), &["backend/auth/sessions.py"]).unwrap();
        assert_eq!(c.effective_risk, RiskLevel::High);
        assert_eq!(
            c.obligating_domains,
            BTreeSet::from(["auth".to_string(), "sessions".to_string()])
        );
        assert_eq!(
            c.required_approval_roles,
            BTreeSet::from([
                "product_owner".to_string(),
                "security_lead".to_string(),
                "tech_lead".to_string()
            ])
        );
        let ids: Vec<&str> = c.required_evidence.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["threat_model", "security_review", "load_test"]);
        // Supervised is more restrictive than Checkpointed.
        assert_eq!(c.autonomy_mode, AutonomyMode::Supervised);
    }

    #[test]
    fn unknown_path_fails_closed() {
        let err = classify(&registry(), &["backend/admin/a.py", "frontend/app.tsx"]).unwrap_err();
        assert_eq!(
            err,
            ClassifyError::UnknownDomain {
                path: "frontend/app.tsx".to_string()
            }
        );
    }

    #[test]
    fn empty_change_set_is_an_error() {
        let empty: [&str; 0] = [];
        assert_eq!(classify(&registry(), &empty).unwrap_err(), ClassifyError::EmptyChangeSet);
        assert_eq!(
            classify(&registry(), &["./", ""]).unwrap_err(),
            ClassifyError::EmptyChangeSet
        );
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(matches!(
            classify(&registry(), &["backend/admin/../auth/tokens.py"]),
            Err(ClassifyError::PathTraversal { .. })
        ));
    }

    #[test]
    fn classification_is_order_independent() {
        let reg = registry();
        let a = classify(
            &reg,
            &["backend/auth/sessions.py", "backend/admin/x.py", "backend/auth/tokens.py"],
        )
        .unwrap();
        let b = classify(
            &reg,
            &["backend/auth/tokens.py", "backend/auth/sessions.py", "backend/admin/x.py"],
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_path_cleans_separators() {
        assert_eq!(normalize_path("./backend//auth\\x.py").unwrap(), "backend/auth/x.py");
        assert_eq!(normalize_path("/docs/a.md").unwrap(), "docs/a.md");
        assert!(normalize_path("../etc/passwd").is_err());
    }

    #[test]
    fn roles_are_normalized() {
        assert_eq!(normalize_role(" Tech Lead "), "tech_lead");
        assert_eq!(normalize_role("security-lead"), "security_lead");
        assert_eq!(normalize_role("PO"), "po");
    }

    #[test]
    fn evidence_for_phase_filters() {
        let c = classify(&registry(), &["backend/auth/sessions.py"]).unwrap();
        assert_eq!(c.evidence_for_phase(EvidencePhase::PreProduction), vec!["load_test"]);
        assert_eq!(
            c.evidence_for_phase(EvidencePhase::PreDevelopment),
            vec!["threat_model"]
        );
    }
}
