//! # veris CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

/// Veris Compliance Stack — multi-tenant compliance assessment backend.
///
/// Runs the API server and inspects the built-in control catalog.
#[derive(Parser, Debug)]
#[command(name = "veris", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server.
    Serve(veris_cli::serve::ServeArgs),
    /// Inspect the built-in control catalog.
    Catalog(veris_cli::catalog::CatalogArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => veris_cli::serve::run(args).await,
        Commands::Catalog(args) => veris_cli::catalog::run(args),
    }
}
