//! Isolates Mermaid markup from a model reply.
//!
//! Models are told to answer with bare markup, but many still wrap it in a
//! ```` ```mermaid ```` fence surrounded by prose. The first such fence wins;
//! without one the reply is passed through untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static MERMAID_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```mermaid([\s\S]*?)```").expect("fence pattern is valid")
});

/// Diagram code ready for preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDiagram {
    pub code: String,
    /// `true` when `code` came from inside a fence.
    pub was_fenced: bool,
}

/// Returns the trimmed body of the first mermaid fence, or `content` verbatim.
pub fn extract_diagram(content: &str) -> ExtractedDiagram {
    match MERMAID_FENCE
        .captures(content)
        .and_then(|caps| caps.get(1))
    {
        Some(body) => {
            debug!(
                reply_len = content.len(),
                body_len = body.len(),
                "Found fenced mermaid block"
            );
            ExtractedDiagram {
                code: body.as_str().trim().to_string(),
                was_fenced: true,
            }
        }
        None => {
            debug!(reply_len = content.len(), "No mermaid fence; using reply as-is");
            ExtractedDiagram {
                code: content.to_string(),
                was_fenced: false,
            }
        }
    }
}
