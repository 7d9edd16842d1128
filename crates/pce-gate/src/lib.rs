//! # pce-gate
//!
//! Gate decision engine for the policy compliance engine.
//!
//! [`GateEngine::evaluate`] takes one [`EvaluationRequest`] (changed paths,
//! description text, reviewer approvals, checklist state, phase) and returns
//! a [`GateDecision`]: `Allow` or `Block` with every violated rule listed.
//!
//! Evaluation is synchronous and side-effect free. Classification and ticket
//! linking failures block on their own; approval, scope, and evidence
//! deficiencies are accumulated so a caller can fix everything in one pass.
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use pce_gate::{EvaluationRequest, GateEngine};
//! use pce_policy::DomainRegistry;
//! use pce_ticket::{PolicyTicket, TicketId};
//!
//! let registry = DomainRegistry::load(".pce/registry.yaml").unwrap();
//! let tickets: BTreeMap<TicketId, PolicyTicket> = BTreeMap::new();
//! let decision = GateEngine::new(&registry, &tickets)
//!     .evaluate(&EvaluationRequest::new(["src/lib.rs"], "PT-CORE-2026-001"));
//! std::process::exit(decision.verdict.exit_code());
//! ```

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod request;

pub use config::{ConfigOverrides, EngineConfig};
pub use decision::{GateCheck, GateDecision, Verdict, Violation, ViolationKind};
pub use engine::GateEngine;
pub use error::ConfigError;
pub use request::EvaluationRequest;
