//! External flattening tool, run once per capture.

use async_trait::async_trait;
use mermaid_flow_core::contract::{FlattenOutput, Flattener};
use mermaid_flow_core::error::AggregationError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info, warn};

/// Runs `<program> <args...> --include <p1,p2,...> --output <file>` in the workspace root.
#[derive(Debug, Clone)]
pub struct CommandFlattener {
    program: String,
    args: Vec<String>,
}

impl CommandFlattener {
    /// `command[0]` is the program, the rest are leading arguments. `None` if empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Full argument list for a run.
    pub fn arguments(&self, paths: &[PathBuf], output: &Path) -> Vec<String> {
        let include = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let mut args = self.args.clone();
        args.push("--include".to_string());
        args.push(include);
        args.push("--output".to_string());
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl Flattener for CommandFlattener {
    async fn flatten(
        &self,
        workspace_root: &Path,
        paths: &[PathBuf],
        output: &Path,
    ) -> Result<FlattenOutput, AggregationError> {
        let args = self.arguments(paths, output);
        info!(
            program = %self.program,
            paths = paths.len(),
            cwd = %workspace_root.display(),
            "Running flattening tool"
        );

        let result = Command::new(&self.program)
            .args(&args)
            .current_dir(workspace_root)
            .output()
            .await
            .map_err(|e| {
                error!(error = ?e, program = %self.program, "Failed to launch flattening tool");
                AggregationError::Tool(format!("could not run {}: {e}", self.program))
            })?;

        if !result.status.success() {
            warn!(status = ?result.status, program = %self.program, "Flattening tool exited with non-zero code");
        }
        Ok(FlattenOutput {
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        })
    }
}
