// risk.rs — Risk levels, autonomy modes, and lifecycle phases.
//
// These three closed enums are the vocabulary every other component speaks.
// All of them are totally ordered so that "highest risk" and "most
// restrictive mode" are plain `max()` calls rather than ad hoc conditionals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Risk level of a domain or ticket. Ordered: Low < Medium < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[serde(alias = "Low")]
    Low,
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "High")]
    High,
    #[serde(alias = "Critical")]
    Critical,
}

impl RiskLevel {
    /// Whether phase ordering of evidence is enforced at this level.
    ///
    /// For Low and Medium risk the ordering is advisory only.
    pub fn enforces_phase_order(self) -> bool {
        self >= RiskLevel::High
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!(
                "unknown risk level '{}' (expected low, medium, high or critical)",
                other
            )),
        }
    }
}

/// How much unsupervised action the agent is permitted.
///
/// Ordered by restrictiveness: `Full` is the least restrictive and
/// `AnalysisOnly` the most. Combining two modes takes the `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyMode {
    /// The agent may act end to end; no human approval is required.
    #[serde(alias = "Full")]
    Full,
    /// The agent acts but pauses at checkpoints for human sign-off.
    #[serde(alias = "Checkpointed")]
    Checkpointed,
    /// Every change is proposed and a human supervises the merge.
    #[serde(alias = "Supervised")]
    Supervised,
    /// The agent may only analyse and propose; production code is off limits.
    #[serde(alias = "AnalysisOnly")]
    AnalysisOnly,
}

impl AutonomyMode {
    /// Whether the gate must see an Approved ticket before allowing.
    pub fn requires_human_approval(self) -> bool {
        self != AutonomyMode::Full
    }
}

impl fmt::Display for AutonomyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutonomyMode::Full => write!(f, "full"),
            AutonomyMode::Checkpointed => write!(f, "checkpointed"),
            AutonomyMode::Supervised => write!(f, "supervised"),
            AutonomyMode::AnalysisOnly => write!(f, "analysis_only"),
        }
    }
}

impl std::str::FromStr for AutonomyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "full" => Ok(AutonomyMode::Full),
            "checkpointed" => Ok(AutonomyMode::Checkpointed),
            "supervised" => Ok(AutonomyMode::Supervised),
            "analysis_only" | "analysisonly" => Ok(AutonomyMode::AnalysisOnly),
            other => Err(format!(
                "unknown autonomy mode '{}' (expected full, checkpointed, supervised or analysis_only)",
                other
            )),
        }
    }
}

/// Lifecycle phase an evidence item belongs to, and the phase a gate evaluates.
///
/// Ordered: PreDevelopment < PreMerge < PreProduction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EvidencePhase {
    #[serde(alias = "development", alias = "PreDevelopment")]
    PreDevelopment,
    #[default]
    #[serde(alias = "merge", alias = "PreMerge")]
    PreMerge,
    #[serde(alias = "production", alias = "PreProduction")]
    PreProduction,
}

impl fmt::Display for EvidencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidencePhase::PreDevelopment => write!(f, "pre_development"),
            EvidencePhase::PreMerge => write!(f, "pre_merge"),
            EvidencePhase::PreProduction => write!(f, "pre_production"),
        }
    }
}

impl std::str::FromStr for EvidencePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "pre_development" | "development" => Ok(EvidencePhase::PreDevelopment),
            "pre_merge" | "merge" => Ok(EvidencePhase::PreMerge),
            "pre_production" | "production" => Ok(EvidencePhase::PreProduction),
            other => Err(format!(
                "unknown phase '{}' (expected pre_development, pre_merge or pre_production)",
                other
            )),
        }
    }
}

/// A required checklist entry, tagged with the phase it gates.
///
/// In YAML it can be written as `{ id: security_review, phase: pre_merge }`
/// or as a bare id string, which defaults to the pre-merge phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "EvidenceRequirementRepr")]
pub struct EvidenceRequirement {
    pub id: String,
    pub phase: EvidencePhase,
}

impl EvidenceRequirement {
    pub fn new(id: impl Into<String>, phase: EvidencePhase) -> Self {
        Self {
            id: id.into(),
            phase,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EvidenceRequirementRepr {
    Bare(String),
    Tagged {
        id: String,
        #[serde(default)]
        phase: EvidencePhase,
    },
}

impl From<EvidenceRequirementRepr> for EvidenceRequirement {
    fn from(repr: EvidenceRequirementRepr) -> Self {
        match repr {
            EvidenceRequirementRepr::Bare(id) => EvidenceRequirement::new(id, EvidencePhase::default()),
            EvidenceRequirementRepr::Tagged { id, phase } => EvidenceRequirement::new(id, phase),
        }
    }
}
