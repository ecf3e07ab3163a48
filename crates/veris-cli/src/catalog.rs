//! # Catalog Subcommand
//!
//! Read-only inspection of the built-in control catalog.

use anyhow::bail;

use veris_assess::StaticCatalog;

/// Arguments for the `catalog` subcommand.
#[derive(clap::Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum CatalogCommand {
    /// List the built-in frameworks.
    Frameworks,
    /// List a framework's controls.
    Controls {
        /// Framework id, e.g. iso27001 or gdpr.
        framework: String,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Run the catalog subcommand.
pub fn run(args: CatalogArgs) -> anyhow::Result<()> {
    let catalog = StaticCatalog::builtin();
    match args.command {
        CatalogCommand::Frameworks => {
            for framework in catalog.frameworks() {
                println!(
                    "{:<10} {:<40} v{:<10} {} controls",
                    framework.id,
                    framework.name,
                    framework.version,
                    framework.controls.len()
                );
            }
            Ok(())
        }
        CatalogCommand::Controls { framework, json } => {
            let Some(framework) = catalog
                .frameworks()
                .iter()
                .find(|f| f.id.as_str() == framework)
            else {
                bail!("unknown framework: {framework:?}");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&framework.controls)?);
            } else {
                for control in &framework.controls {
                    println!(
                        "{:<10} p{:<4} {:<22} {}",
                        control.id, control.implementation_priority, control.domain, control.title
                    );
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frameworks_listing_runs() {
        run(CatalogArgs {
            command: CatalogCommand::Frameworks,
        })
        .unwrap();
    }

    #[test]
    fn unknown_framework_fails() {
        let result = run(CatalogArgs {
            command: CatalogCommand::Controls {
                framework: "pci-dss".into(),
                json: false,
            },
        });
        assert!(result.is_err());
    }
}
