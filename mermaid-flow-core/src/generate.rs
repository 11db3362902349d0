//! High-level pipeline: aggregate → build prompt → complete → extract → present.
//!
//! One call to [`generate`] is one generation. Every stage finishes before
//! the next starts, there is no retry, and the pipeline stops at the first
//! failure. Each outcome other than a shown preview is reported through the
//! [`Notifier`] exactly once.
//!
//! # Callable From
//! - The `mermaid-flow` CLI, once per invocation
//! - Integration tests, with `mockall` doubles for every collaborator
//!
//! # Error Handling
//! Failures come back as [`GenerationOutcome::Failed`]; the caller decides the
//! exit code. Nothing here panics the host.

use tracing::{error, info, warn};

use crate::aggregate::{aggregate, Aggregated, InputSource};
use crate::config::GenerationConfig;
use crate::contract::{CompletionClient, DiagramRequest, Flattener, Notifier, PanelHandle, Presenter};
use crate::error::GenerationError;
use crate::extract::{extract_diagram, ExtractedDiagram};
use crate::preview::PreviewSession;

/// Collaborators for one generation.
pub struct Collaborators<'a> {
    pub completion: &'a dyn CompletionClient,
    pub flattener: &'a dyn Flattener,
    pub presenter: &'a dyn Presenter,
    pub notifier: &'a dyn Notifier,
}

/// How a generation ended.
#[derive(Debug)]
pub enum GenerationOutcome {
    /// No input; carries the informational message that was shown.
    NothingToDo(&'static str),
    /// The model replied without content. Reported as a warning.
    EmptyResult,
    /// A panel is open for the extracted diagram.
    Presented {
        handle: PanelHandle,
        diagram: ExtractedDiagram,
    },
    Failed(GenerationError),
}

impl GenerationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, GenerationOutcome::Failed(_))
    }
}

/// Run the full pipeline for `input` with the settings snapshot `config`.
pub async fn generate(
    input: InputSource,
    config: &GenerationConfig,
    deps: &Collaborators<'_>,
) -> GenerationOutcome {
    info!("[GEN] Starting diagram generation");
    config.trace_loaded();

    match run_stages(input, config, deps).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "[GEN][ERROR] Generation failed");
            deps.notifier.error(&user_message(&e));
            GenerationOutcome::Failed(e)
        }
    }
}

async fn run_stages(
    input: InputSource,
    config: &GenerationConfig,
    deps: &Collaborators<'_>,
) -> Result<GenerationOutcome, GenerationError> {
    if let Some(message) = input.empty_message() {
        return Ok(nothing_to_do(message, deps));
    }

    // A missing key aborts before any external call, the flattener included.
    if config.api_key().is_none() {
        return Err(crate::error::ConfigurationError::MissingApiKey.into());
    }

    // --- Aggregate ---
    let text = match aggregate(input, deps.flattener, deps.notifier).await? {
        Aggregated::Text(text) => text,
        Aggregated::Empty(message) => return Ok(nothing_to_do(message, deps)),
    };

    // --- Build prompt ---
    let request = DiagramRequest::from_config(config, text)?;

    // --- Complete ---
    deps.notifier.progress("Calling completion endpoint...");
    info!(model = %request.model_name, "[GEN] Calling completion endpoint");
    let result = deps.completion.complete(&request).await?;

    // --- Extract ---
    let content = match result.content {
        Some(content) if !content.is_empty() => content,
        _ => {
            warn!("[GEN] Completion returned no content");
            deps.notifier
                .warn("The completion endpoint did not return Mermaid code.");
            return Ok(GenerationOutcome::EmptyResult);
        }
    };
    let diagram = extract_diagram(&content);
    info!(
        was_fenced = diagram.was_fenced,
        len = diagram.code.len(),
        "[GEN] Extracted diagram"
    );

    // --- Present ---
    deps.notifier.progress("Rendering diagram...");
    let session = PreviewSession::new(diagram.clone());
    let handle = deps.presenter.present(session).await?;
    info!(session = %handle.session_id, location = %handle.location, "[GEN] Preview opened");
    Ok(GenerationOutcome::Presented { handle, diagram })
}

fn nothing_to_do(message: &'static str, deps: &Collaborators<'_>) -> GenerationOutcome {
    info!(reason = message, "[GEN] Nothing to generate from");
    deps.notifier.info(message);
    GenerationOutcome::NothingToDo(message)
}

fn user_message(e: &GenerationError) -> String {
    match e {
        GenerationError::Configuration(e) => e.to_string(),
        GenerationError::Aggregation(e) => format!("Error reading input: {e}"),
        GenerationError::Completion(e) => format!("Error generating Mermaid diagram: {e}"),
        GenerationError::Present(e) => e.to_string(),
    }
}
