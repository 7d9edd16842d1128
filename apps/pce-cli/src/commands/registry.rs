// registry.rs — Registry subcommands: check, classify.

use clap::Subcommand;

use super::Context;

#[derive(Subcommand)]
pub enum RegistryCommands {
    /// Load the registry and list its rules.
    Check,
    /// Classify a set of changed paths and print the result as JSON.
    Classify {
        /// Changed paths, relative to the repository root.
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

pub fn execute(cmd: &RegistryCommands, ctx: &Context) -> anyhow::Result<()> {
    let registry = ctx.registry()?;

    match cmd {
        RegistryCommands::Check => {
            println!(
                "Registry {}: {} rule(s)",
                ctx.config.registry_path.display(),
                registry.len()
            );
            println!();
            println!(
                "{:<16} {:<10} {:<14} {:<32} ROLES",
                "DOMAIN", "RISK", "MODE", "PATTERN"
            );
            println!("{}", "-".repeat(90));
            for rule in registry.rules() {
                println!(
                    "{:<16} {:<10} {:<14} {:<32} {}",
                    rule.domain,
                    rule.risk_level.to_string(),
                    rule.autonomy_mode.to_string(),
                    rule.pattern,
                    rule.required_approval_roles.join(", "),
                );
            }
            println!();
            println!(
                "Analysis-only allow-list: {}",
                registry.allow_list().raw_patterns().join(", ")
            );
        }

        RegistryCommands::Classify { paths } => {
            let classification = registry.resolve(paths)?;
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
    }

    Ok(())
}
