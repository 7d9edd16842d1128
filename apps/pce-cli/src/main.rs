//! # pce-cli
//!
//! Command-line interface for the policy compliance engine.
//!
//! - `pce evaluate` — gate a change; exit 0 on Allow, 1 on Block
//! - `pce registry check/classify` — inspect the domain registry
//! - `pce ticket create/show/list` — manage policy tickets
//! - `pce approve`, `pce reject`, `pce evidence` — record reviewer actions
//! - `pce audit verify/tail` — inspect the tamper-evident audit trail
//!
//! Decisions go to stdout as JSON; logs go to stderr.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pce_gate::EngineConfig;
use tracing_subscriber::EnvFilter;

/// Policy compliance engine — gate automated changes by risk domain.
#[derive(Parser)]
#[command(name = "pce", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Domain registry to use instead of the configured one.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Identity recorded as the actor in the audit log.
    #[arg(long, global = true, default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a change request and print the gate decision.
    Evaluate {
        /// Request JSON file, or "-" for stdin.
        #[arg(long, default_value = "-")]
        request: String,
    },
    /// Inspect the domain registry.
    Registry {
        #[command(subcommand)]
        command: commands::registry::RegistryCommands,
    },
    /// Manage policy tickets.
    Ticket {
        #[command(subcommand)]
        command: commands::ticket::TicketCommands,
    },
    /// Record a reviewer approval on a ticket.
    Approve(commands::review::ApproveArgs),
    /// Reject a ticket.
    Reject(commands::review::RejectArgs),
    /// Mark an evidence item complete or incomplete.
    Evidence(commands::review::EvidenceArgs),
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pce_policy=info".parse()?)
                .add_directive("pce_ticket=info".parse()?)
                .add_directive("pce_gate=info".parse()?)
                .add_directive("pce_audit=info".parse()?)
                .add_directive("pce_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let mut config = EngineConfig::load(&project_root)
        .with_context(|| format!("loading engine config for {}", project_root.display()))?;
    if let Some(registry) = cli.registry {
        config.registry_path = registry;
    }
    tracing::debug!(
        registry = %config.registry_path.display(),
        tickets = %config.tickets_dir.display(),
        phase = %config.default_phase,
        "engine config"
    );
    let ctx = commands::Context::new(config, cli.actor);

    match &cli.command {
        Commands::Evaluate { request } => {
            let verdict = commands::evaluate::execute(&ctx, request)?;
            let code = verdict.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Registry { command } => commands::registry::execute(command, &ctx),
        Commands::Ticket { command } => commands::ticket::execute(command, &ctx),
        Commands::Approve(args) => commands::review::approve(args, &ctx),
        Commands::Reject(args) => commands::review::reject(args, &ctx),
        Commands::Evidence(args) => commands::review::evidence(args, &ctx),
        Commands::Audit { command } => commands::audit::execute(command, &ctx),
    }
}
