// registry.rs — The risk-domain registry.
//
// The registry is the catalog of path patterns and the obligations each one
// carries. It is loaded once from a declarative YAML source, every pattern is
// compiled up front, and the result is immutable. Replacing the rule set means
// building a whole new `DomainRegistry` and swapping it into a
// `RegistryHandle`; there is no API for editing rules in place.
//
// Matching is fail-closed: an invalid pattern aborts the load, and a path that
// matches nothing is an error at classification time, never "low risk".

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classifier::{self, Classification};
use crate::error::{ClassifyError, RegistryError};
use crate::exemption::AllowList;
use crate::risk::{AutonomyMode, EvidenceRequirement, RiskLevel};

/// Prefix that marks a rule pattern as a regular expression instead of a glob.
pub const REGEX_PREFIX: &str = "regex:";

/// One declarative registry entry.
///
/// ```yaml
/// - domain: billing
///   pattern: "backend/billing/**"
///   risk_level: critical
///   autonomy_mode: analysis_only
///   required_approval_roles: [tech_lead, security_lead, product_owner]
///   required_evidence:
///     - { id: threat_model, phase: pre_development }
///     - security_review
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainRule {
    /// Name of the risk domain this rule classifies paths into.
    pub domain: String,

    /// Glob pattern, or `regex:<expr>` for a regular expression.
    pub pattern: String,

    #[serde(alias = "riskLevel")]
    pub risk_level: RiskLevel,

    #[serde(alias = "autonomyMode")]
    pub autonomy_mode: AutonomyMode,

    #[serde(default, alias = "requiredApprovalRoles")]
    pub required_approval_roles: Vec<String>,

    /// Ordered, phase-tagged evidence items.
    #[serde(default, alias = "requiredEvidenceIds", alias = "required_evidence_ids")]
    pub required_evidence: Vec<EvidenceRequirement>,
}

/// The on-disk shape of a registry file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistrySource {
    pub rules: Vec<DomainRule>,

    /// Test/documentation patterns exempt from the AnalysisOnly ceiling.
    /// Built-in defaults apply when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_only_allow_list: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
enum PathMatcher {
    Glob(Pattern),
    Regex(Regex),
}

impl PathMatcher {
    fn compile(rule: &DomainRule) -> Result<Self, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidPattern {
            domain: rule.domain.clone(),
            pattern: rule.pattern.clone(),
            reason,
        };
        match rule.pattern.strip_prefix(REGEX_PREFIX) {
            Some(expr) => Regex::new(expr)
                .map(PathMatcher::Regex)
                .map_err(|e| invalid(e.to_string())),
            None => Pattern::new(&rule.pattern)
                .map(PathMatcher::Glob)
                .map_err(|e| invalid(e.to_string())),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Glob(p) => p.matches(path),
            PathMatcher::Regex(r) => r.is_match(path),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: DomainRule,
    matcher: PathMatcher,
}

/// An immutable, fully compiled snapshot of the domain catalog.
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    rules: Vec<CompiledRule>,
    allow_list: AllowList,
}

impl DomainRegistry {
    /// Build a registry from rules, compiling every pattern.
    ///
    /// Uses the default test/documentation allow-list.
    pub fn from_rules(rules: Vec<DomainRule>) -> Result<Self, RegistryError> {
        Self::build(rules, AllowList::defaults())
    }

    /// Build a registry from a parsed registry source.
    pub fn from_source(source: RegistrySource) -> Result<Self, RegistryError> {
        let allow_list = match &source.analysis_only_allow_list {
            Some(patterns) => AllowList::from_patterns(patterns).map_err(|(pattern, reason)| {
                RegistryError::InvalidPattern {
                    domain: "analysis_only_allow_list".to_string(),
                    pattern,
                    reason,
                }
            })?,
            None => AllowList::defaults(),
        };
        Self::build(source.rules, allow_list)
    }

    /// Parse and compile a registry from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        let source: RegistrySource = serde_yaml::from_str(yaml)?;
        Self::from_source(source)
    }

    /// Load a registry file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| RegistryError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_yaml_str(&yaml)?;
        tracing::info!(
            path = %path.display(),
            rules = registry.len(),
            "loaded domain registry"
        );
        Ok(registry)
    }

    fn build(rules: Vec<DomainRule>, allow_list: AllowList) -> Result<Self, RegistryError> {
        if rules.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut compiled = Vec::with_capacity(rules.len());
        for (index, rule) in rules.into_iter().enumerate() {
            if rule.domain.trim().is_empty() {
                return Err(RegistryError::EmptyDomainName { index });
            }
            let matcher = PathMatcher::compile(&rule)?;
            compiled.push(CompiledRule { rule, matcher });
        }
        Ok(Self {
            rules: compiled,
            allow_list,
        })
    }

    /// Number of rules in the registry.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &DomainRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// The rule at a declaration index.
    pub fn rule(&self, index: usize) -> Option<&DomainRule> {
        self.rules.get(index).map(|c| &c.rule)
    }

    /// Indices (declaration order) of every rule matching a normalized path.
    pub fn matching_rules(&self, path: &str) -> Vec<usize> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matcher.matches(path))
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether a domain name is declared by any rule (case-insensitive).
    pub fn has_domain(&self, domain: &str) -> bool {
        self.rules
            .iter()
            .any(|c| c.rule.domain.eq_ignore_ascii_case(domain))
    }

    /// Approval roles declared by a domain's rules at one risk level.
    ///
    /// Lets callers hold a ticket to its own domain's obligations rather than
    /// only those of whatever paths happen to be under review.
    pub fn domain_roles(&self, domain: &str, risk: RiskLevel) -> BTreeSet<String> {
        self.rules
            .iter()
            .map(|c| &c.rule)
            .filter(|r| r.domain.eq_ignore_ascii_case(domain) && r.risk_level == risk)
            .flat_map(|r| r.required_approval_roles.iter())
            .map(|role| classifier::normalize_role(role))
            .filter(|role| !role.is_empty())
            .collect()
    }

    /// Test/documentation patterns exempt from the AnalysisOnly ceiling.
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Resolve the obligations for a set of changed paths.
    pub fn resolve<S: AsRef<str>>(&self, paths: &[S]) -> Result<Classification, ClassifyError> {
        classifier::classify(self, paths)
    }
}

/// Shared handle to the current registry snapshot.
///
/// Readers take an `Arc` snapshot and classify against it for the whole
/// request, so a concurrent `swap()` can never expose a half-updated rule set.
#[derive(Debug)]
pub struct RegistryHandle {
    current: RwLock<Arc<DomainRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: DomainRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry in effect right now.
    pub fn snapshot(&self) -> Arc<DomainRegistry> {
        // The guarded value is a single Arc, so a poisoned lock still holds a
        // complete snapshot.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Atomically replace the whole rule set. Returns the previous snapshot.
    pub fn swap(&self, registry: DomainRegistry) -> Arc<DomainRegistry> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        tracing::info!(rules = registry.len(), "swapping domain registry");
        std::mem::replace(&mut *guard, Arc::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::EvidencePhase;

    const SAMPLE: &str = r#"
rules:
  - domain: billing
    pattern: "backend/billing/**"
    risk_level: critical
    autonomy_mode: analysis_only
    required_approval_roles: [tech_lead, security_lead, product_owner]
    required_evidence:
      - { id: threat_model, phase: pre_development }
      - security_review
  - domain: catalog
    pattern: "backend/admin/**"
    risk_level: low
    autonomy_mode: full
    required_evidence: [CRUD_tests, exclusion_tests]
  - domain: python
    pattern: "regex:^backend/.*\\.py$"
    riskLevel: medium
    autonomyMode: supervised
"#;

    #[test]
    fn loads_rules_from_yaml() {
        let registry = DomainRegistry::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(registry.len(), 3);
        let billing = registry.rule(0).unwrap();
        assert_eq!(billing.risk_level, RiskLevel::Critical);
        assert_eq!(billing.autonomy_mode, AutonomyMode::AnalysisOnly);
        assert_eq!(
            billing.required_evidence[0],
            EvidenceRequirement::new("threat_model", EvidencePhase::PreDevelopment)
        );
        assert_eq!(registry.rule(2).unwrap().risk_level, RiskLevel::Medium);
    }

    #[test]
    fn domain_roles_follow_the_declared_level() {
        let registry = DomainRegistry::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(
            registry
                .domain_roles("Billing", RiskLevel::Critical)
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["product_owner", "security_lead", "tech_lead"]
        );
        assert!(registry.domain_roles("billing", RiskLevel::High).is_empty());
        assert!(registry.domain_roles("catalog", RiskLevel::Low).is_empty());
    }

    #[test]
    fn glob_and_regex_rules_both_match() {
        let registry = DomainRegistry::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(registry.matching_rules("backend/billing/routes.py"), vec![0, 2]);
        assert_eq!(registry.matching_rules("backend/admin/categories.py"), vec![1, 2]);
        assert!(registry.matching_rules("frontend/app.tsx").is_empty());
    }

    #[test]
    fn invalid_glob_is_fatal() {
        let err = DomainRegistry::from_rules(vec![DomainRule {
            domain: "broken".to_string(),
            pattern: "src/[".to_string(),
            risk_level: RiskLevel::Low,
            autonomy_mode: AutonomyMode::Full,
            required_approval_roles: vec![],
            required_evidence: vec![],
        }])
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern { .. }));
    }

    #[test]
    fn invalid_regex_is_fatal() {
        let yaml = "rules:\n  - domain: x\n    pattern: \"regex:(\"\n    risk_level: low\n    autonomy_mode: full\n";
        assert!(matches!(
            DomainRegistry::from_yaml_str(yaml),
            Err(RegistryError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(matches!(
            DomainRegistry::from_yaml_str("rules: []"),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        assert!(matches!(
            DomainRegistry::from_yaml_str("rules: [ { domain: x } ]"),
            Err(RegistryError::Malformed(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DomainRegistry::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, RegistryError::ReadFailed { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let registry = DomainRegistry::load(&path).unwrap();
        assert!(registry.has_domain("BILLING"));
        assert!(!registry.has_domain("auth"));
    }

    #[test]
    fn custom_allow_list_replaces_defaults() {
        let yaml = format!("analysis_only_allow_list: [\"spec/**\"]\n{}", SAMPLE);
        let registry = DomainRegistry::from_yaml_str(&yaml).unwrap();
        assert!(registry.allow_list().is_allowed("spec/billing_spec.rb"));
        assert!(!registry.allow_list().is_allowed("README.md"));
    }

    #[test]
    fn handle_swap_is_whole_snapshot() {
        let handle = RegistryHandle::new(DomainRegistry::from_yaml_str(SAMPLE).unwrap());
        let before = handle.snapshot();
        let replacement = DomainRegistry::from_yaml_str(
            "rules:\n  - domain: all\n    pattern: \"**\"\n    risk_level: high\n    autonomy_mode: supervised\n",
        )
        .unwrap();
        let old = handle.swap(replacement);

        assert_eq!(old.len(), 3);
        // Readers holding the old snapshot keep a consistent view.
        assert_eq!(before.len(), 3);
        assert_eq!(handle.snapshot().len(), 1);
    }
}
