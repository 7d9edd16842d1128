// mod.rs — Shared state for CLI subcommands.

pub mod audit;
pub mod evaluate;
pub mod registry;
pub mod review;
pub mod ticket;

use anyhow::Context as _;
use pce_audit::{AuditLog, AuditRecord};
use pce_gate::EngineConfig;
use pce_policy::DomainRegistry;
use pce_ticket::TicketStore;

/// What every subcommand needs: where state lives and who is acting.
pub struct Context {
    pub config: EngineConfig,
    pub actor: String,
}

impl Context {
    pub fn new(config: EngineConfig, actor: String) -> Self {
        Self { config, actor }
    }

    /// Load the domain registry. A registry that cannot be loaded is fatal.
    pub fn registry(&self) -> anyhow::Result<DomainRegistry> {
        DomainRegistry::load(&self.config.registry_path).with_context(|| {
            format!(
                "cannot load domain registry at {}",
                self.config.registry_path.display()
            )
        })
    }

    pub fn store(&self) -> anyhow::Result<TicketStore> {
        TicketStore::new(&self.config.tickets_dir).with_context(|| {
            format!(
                "cannot open ticket store at {}",
                self.config.tickets_dir.display()
            )
        })
    }

    /// Append one record to the audit log.
    pub fn audit(&self, mut record: AuditRecord) -> anyhow::Result<()> {
        let mut log = AuditLog::open(&self.config.audit_log)?;
        log.append(&mut record)
            .with_context(|| format!("writing audit log {}", log.path().display()))?;
        Ok(())
    }
}
