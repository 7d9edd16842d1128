//! # pce-ticket
//!
//! Policy tickets for the policy compliance engine.
//!
//! A [`PolicyTicket`] authorizes a bounded scope of automated change. This
//! crate links a change description to its ticket ([`TicketLinker`]), applies
//! reviewer approvals and rejections ([`ApprovalResolver`]), and persists
//! tickets with per-ticket write serialization ([`TicketStore`]).
//!
//! ## Key invariants
//!
//! - **One reference**: a description must name exactly one distinct ticket.
//! - **No downgrades**: a ticket declaring less risk than the change blocks.
//! - **One vote per identity**: replaying an approval changes nothing.
//! - **Terminal states stick**: Approved and Rejected tickets never move.

pub mod approval;
pub mod error;
pub mod linker;
pub mod store;
pub mod ticket;

pub use approval::{ApprovalEvent, ApprovalOutcome, ApprovalResolver};
pub use error::TicketError;
pub use linker::{extract_reference, TicketLinker, TicketSource};
pub use store::TicketStore;
pub use ticket::{
    ApprovalRecord, PolicyTicket, RejectionRecord, ScopeViolation, TicketId, TicketStatus,
};
