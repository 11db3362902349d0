//! Preview sessions and the panel → host command protocol.
//!
//! A [`PreviewSession`] is created once per successful extraction and keeps
//! the diagram source for the lifetime of its panel. The panel speaks a closed
//! command set, [`PanelCommand`]; anything else is rejected by
//! [`PanelCommand::parse`] before it reaches a session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info};
use uuid::Uuid;

use crate::contract::{Clipboard, Notifier, SaveDialog};
use crate::error::{CommandError, PersistenceError};
use crate::extract::ExtractedDiagram;

/// Suggested file name offered by the save dialog on export.
pub const DEFAULT_EXPORT_FILENAME: &str = "mermaid-diagram.svg";

/// Rendering library loaded inside the panel.
pub const MERMAID_SCRIPT_URL: &str = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";

const PANEL_TITLE: &str = "Mermaid Preview";

/// Diagram source backing one open panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSession {
    id: Uuid,
    diagram_code: String,
}

/// Messages a panel may send to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum PanelCommand {
    /// Save the rendered SVG markup the panel sends along.
    #[serde(rename = "downloadSVG")]
    ExportRendered { data: String },
    /// Copy the stored diagram source, not the rendered output.
    #[serde(rename = "copyMermaidCode")]
    CopySource,
}

/// What a command did.
#[derive(Debug)]
pub enum CommandOutcome {
    Saved(PathBuf),
    Copied,
    /// The user dismissed the save dialog. Nothing was written or reported.
    Cancelled,
    Failed(PersistenceError),
}

impl PanelCommand {
    const KNOWN: [&'static str; 2] = ["downloadSVG", "copyMermaidCode"];

    /// Decode a raw panel message. Unknown command names are an error.
    pub fn parse(message: &str) -> Result<Self, CommandError> {
        let value: serde_json::Value =
            serde_json::from_str(message).map_err(|e| CommandError::Malformed(e.to_string()))?;
        let name = value
            .get("command")
            .and_then(|c| c.as_str())
            .ok_or_else(|| CommandError::Malformed("missing \"command\" field".into()))?;
        if !Self::KNOWN.contains(&name) {
            return Err(CommandError::Unknown(name.to_string()));
        }
        serde_json::from_value(value).map_err(|e| CommandError::Malformed(e.to_string()))
    }
}

impl PreviewSession {
    pub fn new(diagram: ExtractedDiagram) -> Self {
        Self {
            id: Uuid::new_v4(),
            diagram_code: diagram.code,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Source stored at creation; never changed by panel interaction.
    pub fn diagram_code(&self) -> &str {
        &self.diagram_code
    }

    /// Path the panel posts commands to.
    pub fn command_path(&self) -> String {
        format!("/sessions/{}/command", self.id)
    }

    /// Path the panel notifies when it is closed.
    pub fn close_path(&self) -> String {
        format!("/sessions/{}/close", self.id)
    }

    /// Service one command. Success and failure are each reported once through
    /// `notifier`; a cancelled save is silent.
    pub async fn handle(
        &self,
        command: PanelCommand,
        dialog: &dyn SaveDialog,
        clipboard: &dyn Clipboard,
        notifier: &dyn Notifier,
    ) -> CommandOutcome {
        match command {
            PanelCommand::ExportRendered { data } => self.export(data, dialog, notifier).await,
            PanelCommand::CopySource => match clipboard.write_text(&self.diagram_code).await {
                Ok(()) => {
                    info!(session = %self.id, len = self.diagram_code.len(), "Copied Mermaid code");
                    notifier.info("Mermaid code copied to clipboard.");
                    CommandOutcome::Copied
                }
                Err(e) => {
                    error!(session = %self.id, error = %e, "Clipboard write failed");
                    notifier.error(&e.to_string());
                    CommandOutcome::Failed(e)
                }
            },
        }
    }

    async fn export(
        &self,
        data: String,
        dialog: &dyn SaveDialog,
        notifier: &dyn Notifier,
    ) -> CommandOutcome {
        let path = match dialog.pick_save_location(DEFAULT_EXPORT_FILENAME).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                info!(session = %self.id, "Export cancelled by user");
                return CommandOutcome::Cancelled;
            }
            Err(e) => {
                error!(session = %self.id, error = %e, "Save dialog failed");
                notifier.error(&e.to_string());
                return CommandOutcome::Failed(e);
            }
        };

        match tokio::fs::write(&path, data.as_bytes()).await {
            Ok(()) => {
                info!(session = %self.id, path = %path.display(), size = data.len(), "Saved SVG");
                notifier.info(&format!("SVG saved to {}", path.display()));
                CommandOutcome::Saved(path)
            }
            Err(source) => {
                let e = PersistenceError::Write { path, source };
                error!(session = %self.id, error = %e, "Writing SVG failed");
                notifier.error(&e.to_string());
                CommandOutcome::Failed(e)
            }
        }
    }
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>__TITLE__</title>
    <style>
        body { font-family: sans-serif; margin: 0; }
        .toolbar { display: flex; gap: 8px; padding: 8px; border-bottom: 1px solid #ddd; }
        #diagram { padding: 16px; overflow: auto; }
        #error { color: #b00020; white-space: pre-wrap; padding: 16px; }
    </style>
</head>
<body>
    <div class="toolbar">
        <button id="download">Download SVG</button>
        <button id="copy">Copy Mermaid code</button>
    </div>
    <div id="diagram"></div>
    <div id="error"></div>
    <script src="__MERMAID_SCRIPT__"></script>
    <script>
        window.MERMAID_SOURCE = __SOURCE__;
        const COMMAND_URL = "__COMMAND_URL__";
        const CLOSE_URL = "__CLOSE_URL__";

        function send(message) {
            return fetch(COMMAND_URL, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(message)
            });
        }

        async function draw() {
            mermaid.initialize({ startOnLoad: false, securityLevel: 'strict' });
            try {
                const { svg } = await mermaid.render('mermaid-flow-graph', window.MERMAID_SOURCE);
                document.getElementById('diagram').innerHTML = svg;
            } catch (err) {
                document.getElementById('error').textContent = 'Could not render diagram: ' + err;
            }
        }

        document.getElementById('download').addEventListener('click', () => {
            const svg = document.querySelector('#diagram svg');
            if (svg) {
                send({ command: 'downloadSVG', data: new XMLSerializer().serializeToString(svg) });
            }
        });
        document.getElementById('copy').addEventListener('click', () => {
            send({ command: 'copyMermaidCode' });
        });
        window.addEventListener('pagehide', (event) => {
            if (!event.persisted) {
                navigator.sendBeacon(CLOSE_URL);
            }
        });

        draw();
    </script>
</body>
</html>
"#;

/// Standalone HTML for a session's panel.
///
/// The diagram source is injected as the page variable `window.MERMAID_SOURCE`,
/// never spliced into markup.
pub fn render_page(session: &PreviewSession) -> String {
    PAGE_TEMPLATE
        .replace("__TITLE__", PANEL_TITLE)
        .replace("__MERMAID_SCRIPT__", MERMAID_SCRIPT_URL)
        .replace("__COMMAND_URL__", &session.command_path())
        .replace("__CLOSE_URL__", &session.close_path())
        .replace("__SOURCE__", &script_string_literal(&session.diagram_code))
}

/// JSON string literal that is also safe inside a `<script>` element.
fn script_string_literal(text: &str) -> String {
    let json = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}
