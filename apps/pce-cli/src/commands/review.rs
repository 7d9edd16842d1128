// review.rs — Reviewer actions: approve, reject, evidence.
//
// Each action mutates a stored ticket under its per-ticket lock and is
// recorded in the audit log. Replayed actions are reported as no-ops and
// still audited, so duplicate webhook deliveries stay visible.
//
// An approval is only applied once the paths under review belong to the
// ticket's domain and do not outrank its declared risk. The roles it must
// collect are those of the change plus every role the ticket's own domain
// declares at the ticket's risk level.

use clap::Args;
use pce_audit::{AuditAction, AuditRecord};
use anyhow::Context as _;
use pce_ticket::{ApprovalEvent, ApprovalOutcome, ApprovalResolver, TicketId, TicketLinker};

use super::Context;

#[derive(Args)]
pub struct ApproveArgs {
    /// Ticket to approve.
    pub id: TicketId,
    /// Reviewer identity (one vote per identity).
    #[arg(long)]
    pub identity: String,
    /// Role the reviewer approves as (e.g. tech_lead).
    #[arg(long)]
    pub role: String,
    /// Changed path under review (repeatable, at least one).
    #[arg(long = "path", required = true)]
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct RejectArgs {
    pub id: TicketId,
    #[arg(long)]
    pub identity: String,
    #[arg(long)]
    pub reason: String,
}

#[derive(Args)]
pub struct EvidenceArgs {
    pub id: TicketId,
    /// Evidence item id.
    pub item: String,
    /// Mark the item incomplete instead of complete.
    #[arg(long)]
    pub incomplete: bool,
}

pub fn approve(args: &ApproveArgs, ctx: &Context) -> anyhow::Result<()> {
    let registry = ctx.registry()?;
    let store = ctx.store()?;

    let ticket = store
        .get(&args.id)?
        .ok_or_else(|| anyhow::anyhow!("ticket not found: {}", args.id))?;
    let classification = registry.resolve(&args.paths)?;
    TicketLinker::validate(&ticket, &classification)
        .with_context(|| format!("paths under review do not belong to {}", args.id))?;
    let resolver = ApprovalResolver::for_change(&classification, &ticket, registry.allow_list())
        .with_required_roles(registry.domain_roles(&ticket.domain, ticket.risk_level));
    let event = ApprovalEvent::new(&args.identity, &args.role);

    let (outcome, ticket) = store.approve(&args.id, &resolver, &event)?;

    ctx.audit(
        AuditRecord::new(&args.identity, AuditAction::Approval)
            .with_ticket(args.id.to_string())
            .with_metadata(serde_json::json!({
                "role": args.role,
                "outcome": outcome,
            })),
    )?;

    match outcome {
        ApprovalOutcome::Recorded { status } => {
            println!("Approval by {} recorded; {} is now {}", args.identity, args.id, status)
        }
        ApprovalOutcome::Duplicate { status } => println!(
            "{} already approved {}; no change ({})",
            args.identity, args.id, status
        ),
    }

    let missing = resolver.missing_roles(&ticket);
    if !missing.is_empty() {
        println!(
            "Still waiting on: {}",
            missing.into_iter().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}

pub fn reject(args: &RejectArgs, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store()?;
    let (changed, _) = store.reject(&args.id, &args.identity, &args.reason)?;

    ctx.audit(
        AuditRecord::new(&args.identity, AuditAction::Rejection)
            .with_ticket(args.id.to_string())
            .with_metadata(serde_json::json!({
                "reason": args.reason,
                "changed": changed,
            })),
    )?;

    if changed {
        println!("{} rejected by {}", args.id, args.identity);
    } else {
        println!("{} was already rejected; no change", args.id);
    }
    Ok(())
}

pub fn evidence(args: &EvidenceArgs, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store()?;
    let complete = !args.incomplete;
    let (changed, _) = store.record_evidence(&args.id, &args.item, complete)?;

    ctx.audit(
        AuditRecord::new(&ctx.actor, AuditAction::Evidence)
            .with_ticket(args.id.to_string())
            .with_metadata(serde_json::json!({
                "item": args.item,
                "complete": complete,
                "changed": changed,
            })),
    )?;

    let state = if complete { "complete" } else { "incomplete" };
    if changed {
        println!("{} on {} marked {}", args.item, args.id, state);
    } else {
        println!("{} on {} was already {}; no change", args.item, args.id, state);
    }
    Ok(())
}
