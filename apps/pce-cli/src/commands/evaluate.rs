// evaluate.rs — `pce evaluate`: gate one change request.
//
// Reads an EvaluationRequest as JSON, prints the GateDecision as JSON on
// stdout, and records the decision in the audit log. The caller maps the
// returned verdict to the process exit status.

use std::io::Read;

use anyhow::Context as _;
use pce_audit::{hasher, AuditAction, AuditRecord};
use pce_gate::{EvaluationRequest, GateEngine, Verdict};

use super::Context;

pub fn execute(ctx: &Context, source: &str) -> anyhow::Result<Verdict> {
    let request = read_request(source)?;
    let registry = ctx.registry()?;
    let store = ctx.store()?;

    let decision = GateEngine::new(&registry, &store)
        .with_default_phase(ctx.config.default_phase)
        .evaluate(&request);

    println!("{}", serde_json::to_string_pretty(&decision)?);

    let mut record = AuditRecord::new(&ctx.actor, AuditAction::GateDecision)
        .with_input_hash(hasher::hash_json(&request)?)
        .with_output_hash(hasher::hash_json(&decision)?)
        .with_metadata(serde_json::json!({
            "verdict": decision.verdict,
            "phase": decision.phase,
            "effective_risk": decision.effective_risk,
            "violations": decision.violation_kinds(),
        }));
    if let Some(id) = &decision.ticket_id {
        record = record.with_ticket(id.clone());
    }
    ctx.audit(record)?;

    Ok(decision.verdict)
}

fn read_request(source: &str) -> anyhow::Result<EvaluationRequest> {
    let json = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("reading request file {}", source))?
    };
    serde_json::from_str(&json).context("request is not a valid evaluation request")
}
