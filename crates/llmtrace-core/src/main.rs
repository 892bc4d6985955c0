//! LLMTrace CLI
//!
//! Runs the trace ingestion server.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use llmtrace::server::{create_router, AppState, MemoryTraceStore};

/// LLMTrace - Observability for LLM application calls
#[derive(Parser)]
#[command(name = "llmtrace")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the trace ingestion server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "LLMTRACE_HOST")]
        host: String,

        /// HTTP API port
        #[arg(long, default_value = "8000", env = "LLMTRACE_PORT")]
        port: u16,

        /// API key accepted on the ingestion routes (repeatable)
        #[arg(long = "api-key", env = "LLMTRACE_API_KEY", required = true)]
        api_keys: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Serve { host, port, api_keys } => {
            let state = AppState::new(Arc::new(MemoryTraceStore::new()), api_keys);
            let router = create_router(state);

            let addr = format!("{host}:{port}");
            info!("Starting LLMTrace ingestion server on {addr}");

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            axum::serve(listener, router)
                .await
                .context("server error")?;

            Ok(())
        }
    }
}
