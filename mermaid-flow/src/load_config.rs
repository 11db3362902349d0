/// `load_config` module: Loads the optional YAML settings file and injects the
/// API key from the environment, producing the per-run [`HostConfig`].
///
/// This is the only place where user-supplied YAML is parsed. The pipeline
/// receives a [`GenerationConfig`] snapshot and never reads settings itself.
///
/// # Secrets
/// The API key is taken from `MERMAID_FLOW_API_KEY`, then `OPENAI_API_KEY`,
/// then the `api_key` field of the file. A missing key is not a load error:
/// the pipeline reports it before making any call.
///
/// # Errors
/// Unreadable or unparsable files surface as `anyhow::Error` at the CLI boundary.
use anyhow::Result;
use mermaid_flow_core::config::GenerationConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Environment variables consulted for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["MERMAID_FLOW_API_KEY", "OPENAI_API_KEY"];

/// Accepted keys of the settings file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    pub endpoint_base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Program and leading arguments of the external flattening tool.
    #[serde(default)]
    pub flatten_command: Option<Vec<String>>,
    #[serde(default)]
    pub preview_port: Option<u16>,
}

/// Everything the CLI needs for one run.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    pub generation: GenerationConfig,
    /// `None` selects the built-in flattener.
    pub flatten_command: Option<Vec<String>>,
    /// `0` binds an ephemeral port.
    pub preview_port: u16,
}

/// Load `path` (if given) and merge environment secrets.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<HostConfig> {
    let settings = match path {
        Some(path) => read_settings(path.as_ref())?,
        None => {
            info!("No settings file given, using defaults");
            SettingsFile::default()
        }
    };

    let api_key = API_KEY_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .or(settings.api_key);
    info!(api_key_set = api_key.is_some(), "Resolved API key");

    let flatten_command = settings
        .flatten_command
        .filter(|cmd| !cmd.is_empty() && !cmd[0].trim().is_empty());

    Ok(HostConfig {
        generation: GenerationConfig {
            endpoint_base_url: settings.endpoint_base_url,
            api_key,
            model: settings.model,
            temperature: settings.temperature,
            prompt_template: settings.prompt_template,
        },
        flatten_command,
        preview_port: settings.preview_port.unwrap_or(0),
    })
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path,
                e
            ));
        }
    };

    // An empty file is valid and means "all defaults".
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(settings) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
