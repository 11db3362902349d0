//! Input aggregation: one text blob per generation.
//!
//! A selection or an opened document is used verbatim. A multi-path capture is
//! handed to a [`Flattener`] in one call with every path resolved to an
//! absolute path; its output artifact is read back and then deleted.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::contract::{FlattenOutput, Flattener, Notifier};
use crate::error::AggregationError;

/// Separator written after every file by [`ConcatFlattener`].
pub const FILE_SEPARATOR: &str = "\n\n----------Split File Line----------";

/// Directories never descended into by [`ConcatFlattener`].
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Where the text for a generation comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Editor selection text.
    Selection(String),
    /// A single document already read by the host.
    Document { path: PathBuf, text: String },
    /// Several files or folders, relative paths resolved against `workspace_root`.
    Capture {
        workspace_root: PathBuf,
        paths: Vec<PathBuf>,
    },
}

/// Result of the aggregation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregated {
    Text(String),
    /// Nothing to send. Carries the informational message for the user.
    Empty(&'static str),
}

/// Produce the text for one generation.
///
/// Empty input yields [`Aggregated::Empty`]; flattening failures abort with
/// [`AggregationError`]. Flattener stderr is reported as a single warning.
pub async fn aggregate(
    input: InputSource,
    flattener: &dyn Flattener,
    notifier: &dyn Notifier,
) -> Result<Aggregated, AggregationError> {
    if let Some(message) = input.empty_message() {
        return Ok(Aggregated::Empty(message));
    }
    match input {
        InputSource::Selection(text) => {
            info!(len = text.len(), "Using selection text");
            Ok(Aggregated::Text(text))
        }
        InputSource::Document { path, text } => {
            info!(path = %path.display(), len = text.len(), "Using document text");
            Ok(Aggregated::Text(text))
        }
        InputSource::Capture {
            workspace_root,
            paths,
        } => {
            let text = flatten_capture(&workspace_root, &paths, flattener, notifier).await?;
            if text.is_empty() {
                return Ok(Aggregated::Empty("No text content found in the selected paths."));
            }
            Ok(Aggregated::Text(text))
        }
    }
}

impl InputSource {
    /// Informational message when there is nothing to aggregate, decided
    /// without touching the filesystem or any tool.
    pub fn empty_message(&self) -> Option<&'static str> {
        match self {
            InputSource::Selection(text) if text.is_empty() => Some("No text selected."),
            InputSource::Document { text, .. } if text.is_empty() => {
                Some("The selected file has no text content.")
            }
            InputSource::Capture { paths, .. } if paths.is_empty() => {
                Some("No files or folders selected.")
            }
            _ => None,
        }
    }
}

/// Absolute form of every path; relative ones are joined onto `workspace_root`.
pub async fn resolve_paths(
    workspace_root: &Path,
    paths: &[PathBuf],
) -> Result<Vec<PathBuf>, AggregationError> {
    let mut resolved = Vec::with_capacity(paths.len());
    for path in paths {
        let joined = if path.is_absolute() {
            path.clone()
        } else {
            workspace_root.join(path)
        };
        let absolute = tokio::fs::canonicalize(&joined).await.map_err(|e| {
            error!(error = ?e, path = %joined.display(), "Failed to resolve capture path");
            AggregationError::ResolvePath {
                path: joined.clone(),
                source: e,
            }
        })?;
        debug!(path = %absolute.display(), "Resolved capture path");
        resolved.push(absolute);
    }
    Ok(resolved)
}

async fn flatten_capture(
    workspace_root: &Path,
    paths: &[PathBuf],
    flattener: &dyn Flattener,
    notifier: &dyn Notifier,
) -> Result<String, AggregationError> {
    let resolved = resolve_paths(workspace_root, paths).await?;

    let artifact = tempfile::Builder::new()
        .prefix("mermaid-flow-")
        .suffix(".txt")
        .tempfile()
        .map_err(|e| {
            error!(error = ?e, "Failed to reserve flattening output file");
            AggregationError::Artifact(e)
        })?
        .into_temp_path();

    info!(
        paths = resolved.len(),
        output = %artifact.display(),
        "Flattening capture"
    );
    let FlattenOutput { stderr } = flattener
        .flatten(workspace_root, &resolved, &artifact)
        .await?;
    if !stderr.trim().is_empty() {
        warn!(stderr = %stderr.trim(), "Flattening tool wrote to stderr");
        notifier.warn(&format!("Flattening tool reported: {}", stderr.trim()));
    }

    let text = tokio::fs::read_to_string(&artifact).await.map_err(|e| {
        error!(error = ?e, path = %artifact.display(), "Failed to read flattening output");
        AggregationError::ReadOutput {
            path: artifact.to_path_buf(),
            source: e,
        }
    })?;
    info!(len = text.len(), "Read flattened capture");

    let artifact_path = artifact.to_path_buf();
    if let Err(e) = artifact.close() {
        warn!(error = ?e, path = %artifact_path.display(), "Failed to delete flattening output");
    }
    Ok(text)
}

/// In-process flattener used when no external tool is configured.
///
/// Files are appended in path order, each preceded by a `File:` header and
/// followed by [`FILE_SEPARATOR`]. Unreadable and non-UTF-8 files are skipped,
/// and symlinked directories are not descended into.
#[derive(Debug, Default, Clone)]
pub struct ConcatFlattener;

#[async_trait::async_trait]
impl Flattener for ConcatFlattener {
    async fn flatten(
        &self,
        workspace_root: &Path,
        paths: &[PathBuf],
        output: &Path,
    ) -> Result<FlattenOutput, AggregationError> {
        let root = workspace_root.to_path_buf();
        let paths = paths.to_vec();
        let text = tokio::task::spawn_blocking(move || concat_paths(&root, &paths))
            .await
            .map_err(|e| {
                error!(error = ?e, "Flattening task failed");
                AggregationError::Tool(format!("flattening task failed: {e}"))
            })?;
        tokio::fs::write(output, text)
            .await
            .map_err(|e| AggregationError::Tool(format!("writing {}: {e}", output.display())))?;
        Ok(FlattenOutput::default())
    }
}

fn concat_paths(workspace_root: &Path, paths: &[PathBuf]) -> String {
    let mut files = Vec::new();
    for path in paths {
        if let Err(e) = collect_files(path, &mut files) {
            debug!(error = ?e, path = %path.display(), "Skipping unreadable path");
        }
    }

    let root = workspace_root
        .canonicalize()
        .unwrap_or_else(|_| workspace_root.to_path_buf());
    let mut out = String::new();
    for file in files {
        let bytes = match std::fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = ?e, path = %file.display(), "Skipping unreadable file");
                continue;
            }
        };
        let Ok(text) = String::from_utf8(bytes) else {
            debug!(path = %file.display(), "Skipping non-UTF-8 file");
            continue;
        };
        let shown = file
            .strip_prefix(workspace_root)
            .or_else(|_| file.strip_prefix(&root))
            .unwrap_or(&file);
        out.push_str("File: ");
        out.push_str(&shown.to_string_lossy());
        out.push('\n');
        out.push_str(&text);
        out.push_str(FILE_SEPARATOR);
        debug!(path = %file.display(), size = text.len(), "Concatenated file");
    }
    out
}

fn collect_files(path: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(());
    }
    if !path.is_dir() {
        return Ok(());
    }
    let mut entries = std::fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for entry in entries {
        let name = entry.file_name().and_then(|n| n.to_str()).unwrap_or("");
        // Linked directories are not followed; a link back to an ancestor would never end.
        let linked = entry
            .symlink_metadata()
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if entry.is_dir() && (linked || SKIPPED_DIRS.contains(&name)) {
            debug!(path = %entry.display(), linked, "Skipping directory");
            continue;
        }
        if let Err(e) = collect_files(&entry, files) {
            debug!(error = ?e, path = %entry.display(), "Skipping unreadable directory");
        }
    }
    Ok(())
}
