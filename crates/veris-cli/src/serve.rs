//! # Serve Subcommand
//!
//! Starts the Axum HTTP server. Storage backend selection follows
//! `DATABASE_URL`: PostgreSQL (with embedded migrations) when set,
//! in-memory otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use veris_api::{AppConfig, AppState};
use veris_assess::{ControlEvaluator, NullEvaluator};

/// Arguments for the `serve` subcommand.
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Listen port; overrides the PORT environment variable.
    #[arg(long)]
    pub port: Option<u16>,
}

/// Run the API server until interrupted.
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }

    // No real evaluator ships with the stack — runs record not_assessed
    // findings until a deployment wires one in.
    let evaluator: Arc<dyn ControlEvaluator> = Arc::new(NullEvaluator);

    let state = match veris_api::db::init_pool().await? {
        Some(pool) => AppState::with_postgres(config.clone(), pool, evaluator),
        None => AppState::in_memory(config.clone(), evaluator),
    };

    let app = veris_api::app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Veris API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
