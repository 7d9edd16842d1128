//! # pce-policy
//!
//! Risk-domain registry, change classification, and evidence validation for
//! the policy compliance engine.
//!
//! A [`DomainRegistry`] maps repository path patterns to a risk level, an
//! autonomy mode, and the approvals and evidence that level demands. The
//! [`classify`] function turns a set of changed paths into a
//! [`Classification`]: the effective (highest) risk and the obligations it
//! carries. [`EvidenceValidator`] reports which checklist items are still
//! open for a lifecycle phase.
//!
//! ## Key invariants
//!
//! - **Fail closed**: a path that matches no rule is `UnknownDomain`, never
//!   silently low risk. A pattern that does not compile aborts the load.
//! - **Max risk, union at the top**: overlapping rules resolve to the highest
//!   risk level; rules tied at that level merge their requirements.
//! - **Immutable snapshots**: rule sets are replaced whole through
//!   [`RegistryHandle::swap`], never edited in place.

pub mod classifier;
pub mod error;
pub mod evidence;
pub mod exemption;
pub mod registry;
pub mod risk;

pub use classifier::{classify, normalize_path, normalize_role, Classification};
pub use error::{ClassifyError, RegistryError};
pub use evidence::{EvidenceReport, EvidenceValidator};
pub use exemption::AllowList;
pub use registry::{DomainRegistry, DomainRule, RegistryHandle, RegistrySource};
pub use risk::{AutonomyMode, EvidencePhase, EvidenceRequirement, RiskLevel};
