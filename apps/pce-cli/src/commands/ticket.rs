// ticket.rs — Ticket subcommands: create, show, list.

use clap::Subcommand;
use pce_audit::{AuditAction, AuditRecord};
use pce_policy::{AutonomyMode, EvidencePhase, EvidenceRequirement, RiskLevel};
use pce_ticket::{PolicyTicket, TicketId, TicketStatus};

use super::Context;

#[derive(Subcommand)]
pub enum TicketCommands {
    /// Create a new policy ticket.
    Create {
        /// Ticket id (PT-<DOMAIN>-<YYYY>-<NNN>).
        id: TicketId,
        /// Risk domain the ticket is filed under (defaults to the id's domain).
        #[arg(long)]
        domain: Option<String>,
        /// Declared risk level (low, medium, high, critical).
        #[arg(long)]
        risk: RiskLevel,
        /// Autonomy mode (full, checkpointed, supervised, analysis_only).
        #[arg(long)]
        mode: AutonomyMode,
        /// Path pattern the change may touch (repeatable).
        #[arg(long = "allow")]
        allowed_scope: Vec<String>,
        /// Path pattern the change must not touch (repeatable).
        #[arg(long = "prohibit")]
        prohibited_scope: Vec<String>,
        /// Extra evidence item as `id` or `id:phase` (repeatable).
        #[arg(long = "evidence")]
        evidence: Vec<String>,
    },
    /// Show a ticket as JSON.
    Show {
        id: TicketId,
    },
    /// List tickets.
    List {
        /// Only tickets in this status.
        #[arg(long)]
        status: Option<TicketStatus>,
    },
}

pub fn execute(cmd: &TicketCommands, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store()?;

    match cmd {
        TicketCommands::Create {
            id,
            domain,
            risk,
            mode,
            allowed_scope,
            prohibited_scope,
            evidence,
        } => {
            let domain = domain
                .clone()
                .unwrap_or_else(|| id.domain().to_ascii_lowercase());
            let required_evidence = evidence
                .iter()
                .map(|e| parse_evidence(e))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let ticket = PolicyTicket::new(id.clone(), domain, *risk, *mode)
                .with_allowed_scope(allowed_scope.clone())
                .with_prohibited_scope(prohibited_scope.clone())
                .with_required_evidence(required_evidence);
            store.create(&ticket)?;

            ctx.audit(
                AuditRecord::new(&ctx.actor, AuditAction::TicketCreated)
                    .with_ticket(ticket.id.to_string())
                    .with_metadata(serde_json::json!({
                        "domain": ticket.domain,
                        "risk_level": ticket.risk_level,
                        "autonomy_mode": ticket.autonomy_mode,
                    })),
            )?;
            println!(
                "Created {} ({}, {}, {})",
                ticket.id, ticket.domain, ticket.risk_level, ticket.autonomy_mode
            );
        }

        TicketCommands::Show { id } => match store.get(id)? {
            Some(ticket) => println!("{}", serde_json::to_string_pretty(&ticket)?),
            None => anyhow::bail!("ticket not found: {}", id),
        },

        TicketCommands::List { status } => {
            let tickets = match status {
                Some(s) => store.list_by_status(*s)?,
                None => store.list()?,
            };
            if tickets.is_empty() {
                println!("No tickets.");
                return Ok(());
            }

            println!(
                "{:<22} {:<12} {:<10} {:<14} {:<20} APPROVERS",
                "ID", "DOMAIN", "RISK", "MODE", "STATUS"
            );
            println!("{}", "-".repeat(90));
            for t in &tickets {
                println!(
                    "{:<22} {:<12} {:<10} {:<14} {:<20} {}",
                    t.id.to_string(),
                    t.domain,
                    t.risk_level.to_string(),
                    t.autonomy_mode.to_string(),
                    t.status.to_string(),
                    t.approvals.len(),
                );
            }
        }
    }

    Ok(())
}

/// Parse `id` or `id:phase`. A bare id gates the pre-merge phase.
fn parse_evidence(spec: &str) -> anyhow::Result<EvidenceRequirement> {
    match spec.split_once(':') {
        Some((id, phase)) => {
            let phase: EvidencePhase = phase.parse().map_err(anyhow::Error::msg)?;
            Ok(EvidenceRequirement::new(id.trim(), phase))
        }
        None => Ok(EvidenceRequirement::new(spec.trim(), EvidencePhase::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_spec_parses_phase() {
        let req = parse_evidence("threat_model:pre_development").unwrap();
        assert_eq!(req.phase, EvidencePhase::PreDevelopment);
        assert_eq!(req.id, "threat_model");

        let bare = parse_evidence("load_test").unwrap();
        assert_eq!(bare.phase, EvidencePhase::PreMerge);

        assert!(parse_evidence("x:later").is_err());
    }
}
