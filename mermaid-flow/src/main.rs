use anyhow::Result;
use clap::Parser;
use mermaid_flow::cli::{run, Cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the preview location. They are
    // off unless RUST_LOG asks for them; user-facing messages come from the notifier.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")))
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    tracing::info!("CLI arguments parsed, invoking run");
    let result = run(cli).await;
    match &result {
        Ok(code) => tracing::info!(?code, "CLI completed"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
