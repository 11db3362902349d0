///
/// This module implements the CLI interface for mermaid-flow: command parsing,
/// wiring of the real collaborators, and the async `run` entrypoint.
///
/// All pipeline logic (aggregation, prompts, extraction, preview sessions)
/// lives in the [`mermaid-flow-core`] crate. This module is CLI glue only.
///
/// ## Features
/// - [`Cli`] defines the global `--config` option and the three input commands.
/// - [`run`] is the programmatic entrypoint used by `main` and integration tests.
/// - After a preview opens, `run` keeps serving it until every panel is closed
///   or the process receives Ctrl-C.
///
/// [`mermaid-flow-core`]: ../../mermaid-flow-core/
use crate::completion::OpenAiClient;
use crate::desktop::{ConsoleNotifier, SystemClipboard, TerminalSaveDialog};
use crate::flatten::CommandFlattener;
use crate::load_config::{load_config, HostConfig};
use crate::preview_server::{BrowserPresenter, PreviewState};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mermaid_flow_core::aggregate::{ConcatFlattener, InputSource};
use mermaid_flow_core::contract::{Flattener, Notifier};
use mermaid_flow_core::generate::{generate, Collaborators, GenerationOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// CLI for mermaid-flow: turn source code into a Mermaid flow diagram.
#[derive(Parser)]
#[clap(
    name = "mermaid-flow",
    version,
    about = "Generate a Mermaid flow diagram from code with an OpenAI-compatible model and preview it"
)]
pub struct Cli {
    /// Path to the YAML settings file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the preview address instead of opening it in the browser
    #[clap(long, global = true)]
    pub no_open: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate from a text selection (argument, or stdin when omitted)
    Selection {
        text: Option<String>,
    },
    /// Generate from a single file
    File {
        path: PathBuf,
    },
    /// Generate from several files or folders, flattened into one document
    Capture {
        /// Workspace root; relative paths are resolved against it
        #[clap(long, default_value = ".")]
        workspace: PathBuf,
        paths: Vec<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
///
/// Pipeline failures were already reported through the notifier, so they map to
/// [`ExitCode::FAILURE`] here; `Err` is reserved for host problems such as an
/// unreadable settings file.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    tracing::info!("trace_initialised");

    let config = load_config(cli.config.as_ref())?;
    let input = read_input(cli.command).await?;

    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
    let state = PreviewState::new(
        Arc::new(TerminalSaveDialog),
        Arc::new(SystemClipboard),
        notifier.clone(),
    );
    let presenter = BrowserPresenter::bind(config.preview_port, state)
        .await
        .context("Failed to start preview server")?
        .launching_browser(!cli.no_open);
    let completion = OpenAiClient::new();
    let flattener = flattener_for(&config);

    let deps = Collaborators {
        completion: &completion,
        flattener: flattener.as_ref(),
        presenter: &presenter,
        notifier: notifier.as_ref(),
    };

    match generate(input, &config.generation, &deps).await {
        GenerationOutcome::Presented { handle, .. } => {
            tracing::info!(command = "generate", location = %handle.location, "Waiting for preview to close");
            println!("{}", handle.location);
            tokio::select! {
                _ = presenter.wait_until_closed() => {
                    tracing::info!("All preview panels closed");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down preview server");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        GenerationOutcome::NothingToDo(_) | GenerationOutcome::EmptyResult => Ok(ExitCode::SUCCESS),
        GenerationOutcome::Failed(e) => {
            tracing::debug!(command = "generate", error = %e, "Generation failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn flattener_for(config: &HostConfig) -> Box<dyn Flattener> {
    match config
        .flatten_command
        .as_deref()
        .and_then(CommandFlattener::from_command)
    {
        Some(tool) => Box::new(tool),
        None => Box::new(ConcatFlattener),
    }
}

async fn read_input(command: Commands) -> Result<InputSource> {
    match command {
        Commands::Selection { text: Some(text) } => Ok(InputSource::Selection(text)),
        Commands::Selection { text: None } => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read selection from stdin")?;
            Ok(InputSource::Selection(text))
        }
        Commands::File { path } => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Error reading file {}", path.display()))?;
            Ok(InputSource::Document { path, text })
        }
        Commands::Capture { workspace, paths } => Ok(InputSource::Capture {
            workspace_root: workspace,
            paths,
        }),
    }
}
