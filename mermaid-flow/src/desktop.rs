//! Terminal and desktop implementations of the interactive collaborators:
//! save prompt, system clipboard and user notifications.

use async_trait::async_trait;
use mermaid_flow_core::contract::{Clipboard, Notifier, SaveDialog};
use mermaid_flow_core::error::PersistenceError;
use std::path::PathBuf;

/// Asks for a save location on the controlling terminal.
#[derive(Debug, Default, Clone)]
pub struct TerminalSaveDialog;

#[async_trait]
impl SaveDialog for TerminalSaveDialog {
    async fn pick_save_location(
        &self,
        suggested_name: &str,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        let suggested = suggested_name.to_string();
        tokio::task::spawn_blocking(move || {
            let wanted = dialoguer::Confirm::new()
                .with_prompt("Save the rendered diagram as SVG?")
                .default(true)
                .interact_opt()
                .map_err(|e| PersistenceError::Dialog(e.to_string()))?;
            if wanted != Some(true) {
                return Ok(None);
            }
            let name: String = dialoguer::Input::new()
                .with_prompt("Save as")
                .default(suggested)
                .interact_text()
                .map_err(|e| PersistenceError::Dialog(e.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Ok(None);
            }
            Ok(Some(PathBuf::from(name)))
        })
        .await
        .map_err(|e| PersistenceError::Dialog(e.to_string()))?
    }
}

/// The OS clipboard via `arboard`.
#[derive(Debug, Default, Clone)]
pub struct SystemClipboard;

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn write_text(&self, text: &str) -> Result<(), PersistenceError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut clipboard =
                arboard::Clipboard::new().map_err(|e| PersistenceError::Clipboard(e.to_string()))?;
            clipboard
                .set_text(text)
                .map_err(|e| PersistenceError::Clipboard(e.to_string()))
        })
        .await
        .map_err(|e| PersistenceError::Clipboard(e.to_string()))?
    }
}

/// Prints notifications to stderr and mirrors them to tracing.
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        tracing::info!(notification = message, "info");
        eprintln!("[INFO] {message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(notification = message, "warning");
        eprintln!("[WARN] {message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(notification = message, "error");
        eprintln!("[ERROR] {message}");
    }

    fn progress(&self, message: &str) {
        tracing::info!(progress = message, "progress");
        eprintln!("... {message}");
    }
}
