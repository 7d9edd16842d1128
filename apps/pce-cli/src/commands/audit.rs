// audit.rs — `pce audit`: check and browse the decision trail.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use pce_audit::{AuditAction, AuditError, AuditFilter, AuditLog, AuditRecord};
use pce_ticket::TicketId;

use super::Context;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Recheck the hash chain and that every record is self-consistent.
    Verify {
        /// Audit log to check instead of the configured one.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// List the most recent records, optionally for one ticket.
    Tail {
        #[arg(long)]
        log: Option<PathBuf>,
        /// Only records about this ticket.
        #[arg(long)]
        ticket: Option<TicketId>,
        /// Only one kind of record (gate_decision, ticket_created, approval,
        /// rejection, evidence).
        #[arg(long)]
        action: Option<AuditAction>,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &AuditCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => verify(&log_path(log, ctx)),
        AuditCommands::Tail {
            log,
            ticket,
            action,
            n,
        } => {
            let filter = AuditFilter {
                ticket_id: ticket.as_ref().map(TicketId::to_string),
                action: *action,
            };
            tail(&log_path(log, ctx), &filter, *n)
        }
    }
}

fn log_path(log: &Option<PathBuf>, ctx: &Context) -> PathBuf {
    log.clone().unwrap_or_else(|| ctx.config.audit_log.clone())
}

fn verify(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!("No audit log at {}; nothing has been gated yet.", path.display());
        return Ok(());
    }

    match AuditLog::verify(path) {
        Ok(report) => {
            println!(
                "Audit log verified: {} record(s) over {} ticket(s); {} allowed, {} blocked.",
                report.records,
                report.tickets.len(),
                report.allowed,
                report.blocked
            );
            Ok(())
        }
        Err(AuditError::IntegrityViolation {
            line,
            expected,
            actual,
        }) => {
            println!("Hash chain broken at line {}:", line);
            println!("  expected previous_hash {}", expected);
            println!("  found    previous_hash {}", actual);
            anyhow::bail!("audit log has been altered")
        }
        Err(AuditError::InconsistentRecord { line, reason }) => {
            println!("Record at line {} contradicts itself: {}", line, reason);
            anyhow::bail!("audit log holds an inconsistent record")
        }
        Err(e) => Err(e.into()),
    }
}

fn tail(path: &Path, filter: &AuditFilter, n: usize) -> anyhow::Result<()> {
    if !path.exists() {
        println!("No audit log at {}.", path.display());
        return Ok(());
    }

    let records = AuditLog::read(path, filter)?;
    let recent = &records[records.len().saturating_sub(n)..];
    if recent.is_empty() {
        println!("No matching audit records.");
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:<15} {:<18} DETAIL",
        "TIMESTAMP", "ACTOR", "ACTION", "TICKET"
    );
    println!("{}", "-".repeat(90));
    for record in recent {
        println!(
            "{:<20} {:<12} {:<15} {:<18} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.actor,
            record.action.to_string(),
            record.ticket_id.as_deref().unwrap_or("-"),
            detail(record),
        );
    }
    Ok(())
}

/// One-line summary of what the record says, per action.
fn detail(record: &AuditRecord) -> String {
    let field = |key: &str| {
        record
            .metadata
            .get(key)
            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
            .unwrap_or_default()
    };
    match record.action {
        AuditAction::GateDecision => {
            let violations: Vec<String> = record
                .metadata
                .get("violations")
                .and_then(|v| v.as_array())
                .map(|kinds| {
                    kinds
                        .iter()
                        .filter_map(|k| k.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            if violations.is_empty() {
                field("verdict")
            } else {
                format!("{} [{}]", field("verdict"), violations.join(", "))
            }
        }
        AuditAction::TicketCreated => format!(
            "{} {}/{}",
            field("domain"),
            field("risk_level"),
            field("autonomy_mode")
        ),
        AuditAction::Approval => {
            let outcome = record
                .metadata
                .get("outcome")
                .and_then(|o| o.get("outcome"))
                .and_then(|o| o.as_str())
                .unwrap_or("-");
            format!("{} ({})", field("role"), outcome)
        }
        AuditAction::Rejection => field("reason"),
        AuditAction::Evidence => format!("{} complete={}", field("item"), field("complete")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detail_summarizes_each_action() {
        let blocked = AuditRecord::new("ci", AuditAction::GateDecision).with_metadata(
            serde_json::json!({"verdict": "block", "violations": ["scope_violation", "incomplete_evidence"]}),
        );
        assert_eq!(detail(&blocked), "block [scope_violation, incomplete_evidence]");

        let approval = AuditRecord::new("ana", AuditAction::Approval).with_metadata(
            serde_json::json!({"role": "tech_lead", "outcome": {"outcome": "recorded", "status": "approved"}}),
        );
        assert_eq!(detail(&approval), "tech_lead (recorded)");

        let evidence = AuditRecord::new("cli", AuditAction::Evidence)
            .with_metadata(serde_json::json!({"item": "threat_model", "complete": true}));
        assert_eq!(detail(&evidence), "threat_model complete=true");
    }

    #[test]
    fn verify_fails_on_inconsistent_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut log = AuditLog::open(&path).unwrap();
        log.append(&mut AuditRecord::new("ana", AuditAction::Approval))
            .unwrap();

        assert!(verify(&path).is_err());
    }

    #[test]
    fn verify_and_tail_tolerate_a_missing_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        assert!(verify(&path).is_ok());
        assert!(tail(&path, &AuditFilter::default(), 5).is_ok());
    }
}
