use tracing::{debug, info};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Settings snapshot for one generation.
///
/// Read once when a generation starts and never mutated by the pipeline, so
/// concurrent generations cannot observe each other's settings.
#[derive(Clone, Default)]
pub struct GenerationConfig {
    /// Overrides the completion endpoint; `None` or empty means the provider default.
    pub endpoint_base_url: Option<String>,
    /// Required before any call is attempted.
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Forwarded only when set.
    pub temperature: Option<f32>,
    /// Replaces the built-in instruction text when non-empty.
    pub prompt_template: Option<String>,
}

impl GenerationConfig {
    /// Configured model name, or [`DEFAULT_MODEL`].
    pub fn model_name(&self) -> &str {
        match self.model.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => DEFAULT_MODEL,
        }
    }

    /// Non-empty API key, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Non-empty endpoint override, if any.
    pub fn endpoint_base_url(&self) -> Option<&str> {
        self.endpoint_base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
    }

    pub fn trace_loaded(&self) {
        info!(
            model = self.model_name(),
            endpoint = self.endpoint_base_url().unwrap_or("<provider default>"),
            temperature = ?self.temperature,
            custom_prompt = self.prompt_template.is_some(),
            api_key_set = self.api_key().is_some(),
            "Loaded generation config"
        );
        debug!(config = ?self, "Generation config loaded (full debug)");
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("endpoint_base_url", &self.endpoint_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("prompt_template", &self.prompt_template)
            .finish()
    }
}
