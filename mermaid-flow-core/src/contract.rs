//! # contract: collaborator interfaces for the generation pipeline
//!
//! The pipeline in [`crate::generate`] never touches the network, a shell, the
//! filesystem dialogs or the clipboard directly. It talks to the traits below,
//! and the `mermaid-flow` binary crate supplies the real implementations:
//!
//! - [`CompletionClient`]: one chat-completion call.
//! - [`Flattener`]: turns several paths into one document on disk.
//! - [`Presenter`]: opens a preview panel for a [`PreviewSession`].
//! - [`SaveDialog`] and [`Clipboard`]: used by panel commands.
//! - [`Notifier`]: the single user-visible channel for info, warnings and errors.
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`; with the `test-export-mocks` feature
//! (on by default) the generated `Mock*` types are exported for integration tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{AggregationError, CompletionError, PersistenceError, PresentError};
use crate::preview::PreviewSession;

/// Everything one completion call needs. Never built without a non-empty API key.
#[derive(Clone, PartialEq)]
pub struct DiagramRequest {
    pub raw_input_text: String,
    /// Resolved template: the configured one, or the built-in default.
    pub prompt_template: String,
    pub model_name: String,
    pub temperature: Option<f32>,
    pub endpoint_base_url: Option<String>,
    pub api_key: String,
}

impl std::fmt::Debug for DiagramRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramRequest")
            .field("raw_input_len", &self.raw_input_text.len())
            .field("prompt_template_len", &self.prompt_template.len())
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("endpoint_base_url", &self.endpoint_base_url)
            .finish_non_exhaustive()
    }
}

/// Raw model reply. `content: None` is a valid outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionResult {
    pub content: Option<String>,
}

/// What a flattening run left behind besides the output file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenOutput {
    /// Tool stderr; surfaced as a warning when non-empty.
    pub stderr: String,
}

/// Returned by a [`Presenter`] once a panel is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelHandle {
    pub session_id: Uuid,
    /// Where the panel can be reached, e.g. a local URL.
    pub location: String,
}

/// Issues exactly one chat-completion call.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the first choice's message content, or `None` when the endpoint sent none.
    async fn complete(&self, request: &DiagramRequest) -> Result<CompletionResult, CompletionError>;
}

/// Concatenates several files or folders into a single document written to `output`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Flattener: Send + Sync {
    /// `paths` are absolute; `workspace_root` is the working directory for the run.
    async fn flatten(
        &self,
        workspace_root: &Path,
        paths: &[PathBuf],
        output: &Path,
    ) -> Result<FlattenOutput, AggregationError>;
}

/// Owns preview panels. Each call opens a new panel; panels are never reused.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn present(&self, session: PreviewSession) -> Result<PanelHandle, PresentError>;
}

/// Asks the user where to save an export. `Ok(None)` means the user cancelled.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SaveDialog: Send + Sync {
    async fn pick_save_location(
        &self,
        suggested_name: &str,
    ) -> Result<Option<PathBuf>, PersistenceError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), PersistenceError>;
}

/// User-visible notifications. One call per reported outcome.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    /// Non-cancellable progress text for the running generation.
    fn progress(&self, message: &str);
}
