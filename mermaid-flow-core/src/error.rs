//! Failure classes for a single generation and for panel commands.
//!
//! Every variant ends the operation that raised it and nothing else: the
//! pipeline reports it through [`crate::contract::Notifier`] exactly once and
//! returns. An empty model reply is not an error; see
//! [`crate::generate::GenerationOutcome::EmptyResult`].

use std::path::PathBuf;
use thiserror::Error;

/// Missing or unusable settings detected before any external call.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("API key is not configured. Set it in settings or the environment.")]
    MissingApiKey,
}

/// Failure while turning a multi-path capture into one text blob.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("could not resolve path {path}: {source}")]
    ResolvePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not reserve an output file for the flattening tool: {0}")]
    Artifact(#[source] std::io::Error),
    #[error("flattening tool failed: {0}")]
    Tool(String),
    #[error("could not read flattening output {path}: {source}")]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything raised by the completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request to completion endpoint failed: {0}")]
    Transport(String),
    #[error("completion endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },
    #[error("could not decode completion response: {0}")]
    Decode(String),
}

/// The preview panel could not be opened.
#[derive(Debug, Error)]
#[error("could not open preview panel: {0}")]
pub struct PresentError(pub String);

/// Writing an export or the clipboard failed. Reported per command; the panel stays open.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to save diagram to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to pick a save location: {0}")]
    Dialog(String),
    #[error("failed to copy Mermaid code: {0}")]
    Clipboard(String),
}

/// Panel message that does not belong to the command set.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown panel command: {0}")]
    Unknown(String),
    #[error("malformed panel message: {0}")]
    Malformed(String),
}

/// Terminal failure of one generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Present(#[from] PresentError),
}
