//! Prompt construction: `prompt = template + input`.

use serde::Serialize;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::contract::DiagramRequest;
use crate::error::ConfigurationError;

/// Built-in instruction text used when no template is configured.
pub const DEFAULT_PROMPT: &str = r#"
- Role: Software architecture analyst and code-flow visualization expert
- Background: The user wants to understand how a directory of code, a single file or a snippet executes. The goal may be review, optimisation, refactoring or learning, and a visual overview is the fastest way to grasp the key logic and structure.
- Profile: You are a senior software architecture analyst who reads code in any language and knows its structure and execution flow. You turn complex logic into clear Mermaid flowcharts.
- Skills: Locate entry points, function call relationships, conditional branches, loops, key variable changes, exception handling and calls to external dependencies, and express them as a Mermaid flowchart.
- Goals: Produce a detailed Mermaid flowchart of the execution flow covering entry points, call relationships, branches, loop iterations, key state changes, exception paths and external calls.
- Constraints: Use Mermaid syntax. Every node carries a clear description and arrows show execution order. When the code spans several files or modules, show the calls and data passed between them.
- OutputFormat: Reply with the Mermaid flowchart code only. Do not add any text outside the code and do not use Markdown formatting.
- Workflow:
  1. Parse the provided directory, file or snippet and find the program entry point.
  2. Follow call relationships and execution order; identify branches, loops, key state changes, exception handling and external calls.
  3. Build the flowchart in Mermaid syntax with a description on every node and arrows for execution order, including cross-file calls and data flow.
- Examples:
  - Example 1: single-file flowchart
    <mermaid>
      graph TD
        A[Entry point main] --> B[Call func1]
        B --> C[Condition if/else]
        C -->|true| D[Branch 1]
        C -->|false| E[Branch 2]
        D --> F[Loop for]
        F -->|done| G[Return from function]
        E --> H[Exception handling try/catch]
        H --> I[External API call]
        I --> J[Update state]
        J --> K[Program end]
    </mermaid>
  - Example 2: multi-file module flowchart
    <mermaid>
      graph TD
        A[Module 1 entry main] --> B[Call module 2 func2]
        B --> C[Module 2 func2]
        C --> D[Condition switch]
        D -->|case1| E[Call module 3 func3]
        D -->|case2| F[Local logic]
        E --> G[Module 3 func3]
        G --> H[Loop while]
        H -->|done| I[Return to module 2]
        F --> J[Exception handling try/catch]
        J --> K[External API call]
        K --> L[Update state]
        L --> M[Return to module 1]
        M --> N[Program end]
    </mermaid>
"#;

/// The configured template if it has any content, otherwise [`DEFAULT_PROMPT`].
pub fn resolve_template(configured: Option<&str>) -> &str {
    match configured {
        Some(t) if !t.is_empty() => t,
        _ => DEFAULT_PROMPT,
    }
}

/// Plain concatenation; no separator is inserted.
pub fn build_prompt(template: &str, input: &str) -> String {
    let mut prompt = String::with_capacity(template.len() + input.len());
    prompt.push_str(template);
    prompt.push_str(input);
    prompt
}

impl DiagramRequest {
    /// Snapshot `config` into a request for `input`.
    ///
    /// Fails without a non-empty API key, so a request that exists can always be dispatched.
    pub fn from_config(
        config: &GenerationConfig,
        input: String,
    ) -> Result<Self, ConfigurationError> {
        let api_key = config
            .api_key()
            .ok_or(ConfigurationError::MissingApiKey)?
            .to_string();
        let prompt_template = resolve_template(config.prompt_template.as_deref()).to_string();
        debug!(
            input_len = input.len(),
            template_len = prompt_template.len(),
            "Built diagram request"
        );
        Ok(Self {
            raw_input_text: input,
            prompt_template,
            model_name: config.model_name().to_string(),
            temperature: config.temperature,
            endpoint_base_url: config.endpoint_base_url().map(str::to_string),
            api_key,
        })
    }

    pub fn prompt(&self) -> String {
        build_prompt(&self.prompt_template, &self.raw_input_text)
    }

    /// JSON body for an OpenAI-compatible `/chat/completions` call.
    pub fn to_body(&self) -> ChatCompletionBody {
        ChatCompletionBody {
            model: self.model_name.clone(),
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: self.prompt(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionBody {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}
