//! Browser-based preview panels.
//!
//! [`BrowserPresenter`] runs a small local `axum` server. Each presented
//! [`PreviewSession`] gets its own page at `/sessions/{id}/`; the page posts
//! panel commands to `/sessions/{id}/command` and reports its closing to
//! `/sessions/{id}/close`, which drops the session. When enabled, each page
//! is also handed to the system browser.

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mermaid_flow_core::contract::{Clipboard, Notifier, PanelHandle, Presenter, SaveDialog};
use mermaid_flow_core::error::{CommandError, PresentError};
use mermaid_flow_core::preview::{render_page, CommandOutcome, PanelCommand, PreviewSession};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

/// Shared by the presenter and the HTTP handlers.
pub struct PreviewState {
    sessions: Mutex<HashMap<Uuid, PreviewSession>>,
    all_closed: Notify,
    dialog: Arc<dyn SaveDialog>,
    clipboard: Arc<dyn Clipboard>,
    notifier: Arc<dyn Notifier>,
}

impl PreviewState {
    pub fn new(
        dialog: Arc<dyn SaveDialog>,
        clipboard: Arc<dyn Clipboard>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            all_closed: Notify::new(),
            dialog,
            clipboard,
            notifier,
        })
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, PreviewSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, session: PreviewSession) {
        self.lock_sessions().insert(session.id(), session);
    }

    pub fn get(&self, id: &Uuid) -> Option<PreviewSession> {
        self.lock_sessions().get(id).cloned()
    }

    /// Drop a session; wakes [`BrowserPresenter::wait_until_closed`] when none remain.
    pub fn close(&self, id: &Uuid) -> bool {
        let mut sessions = self.lock_sessions();
        let removed = sessions.remove(id).is_some();
        if removed && sessions.is_empty() {
            self.all_closed.notify_waiters();
        }
        removed
    }

    pub fn open_sessions(&self) -> usize {
        self.lock_sessions().len()
    }
}

/// Routes for session pages and the panel protocol.
pub fn router(state: Arc<PreviewState>) -> Router {
    Router::new()
        .route("/sessions/{id}/", get(page))
        .route("/sessions/{id}/command", post(command))
        .route("/sessions/{id}/close", post(close))
        .with_state(state)
}

async fn page(State(state): State<Arc<PreviewState>>, Path(id): Path<Uuid>) -> Response {
    match state.get(&id) {
        Some(session) => Html(render_page(&session)).into_response(),
        None => (StatusCode::NOT_FOUND, "preview closed").into_response(),
    }
}

async fn command(
    State(state): State<Arc<PreviewState>>,
    Path(id): Path<Uuid>,
    body: String,
) -> Response {
    let command = match PanelCommand::parse(&body) {
        Ok(command) => command,
        Err(e) => {
            let kind = match &e {
                CommandError::Unknown(_) => "unknown_command",
                CommandError::Malformed(_) => "malformed",
            };
            tracing::warn!(session = %id, error = %e, "Rejected panel message");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": kind, "message": e.to_string() })),
            )
                .into_response();
        }
    };

    let Some(session) = state.get(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "no_session" }))).into_response();
    };

    let outcome = session
        .handle(
            command,
            state.dialog.as_ref(),
            state.clipboard.as_ref(),
            state.notifier.as_ref(),
        )
        .await;
    let body = match outcome {
        CommandOutcome::Saved(path) => json!({ "outcome": "saved", "path": path }),
        CommandOutcome::Copied => json!({ "outcome": "copied" }),
        CommandOutcome::Cancelled => json!({ "outcome": "cancelled" }),
        CommandOutcome::Failed(e) => json!({ "outcome": "failed", "message": e.to_string() }),
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn close(State(state): State<Arc<PreviewState>>, Path(id): Path<Uuid>) -> StatusCode {
    if state.close(&id) {
        tracing::info!(session = %id, "Preview panel closed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Opens one browser page per presented session.
pub struct BrowserPresenter {
    state: Arc<PreviewState>,
    addr: SocketAddr,
    launch_browser: bool,
}

impl BrowserPresenter {
    /// Bind `127.0.0.1:port` and start serving in the background.
    pub async fn bind(port: u16, state: Arc<PreviewState>) -> std::io::Result<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;
        let app = router(state.clone());
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!(error = %err, "Preview server stopped");
            }
        });
        tracing::info!(%addr, "Preview server listening");
        Ok(Self {
            state,
            addr,
            launch_browser: false,
        })
    }

    /// Also open each presented page in the system browser.
    pub fn launching_browser(mut self, launch: bool) -> Self {
        self.launch_browser = launch;
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> &Arc<PreviewState> {
        &self.state
    }

    /// Resolves once every presented session has been closed.
    pub async fn wait_until_closed(&self) {
        loop {
            let notified = self.state.all_closed.notified();
            if self.state.open_sessions() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Presenter for BrowserPresenter {
    async fn present(&self, session: PreviewSession) -> Result<PanelHandle, PresentError> {
        let session_id = session.id();
        let location = format!("{}/sessions/{}/", self.base_url(), session_id);
        self.state.insert(session);
        tracing::info!(session = %session_id, location = %location, "Presented preview session");
        let opened = self.launch_browser && open_in_browser(&location);
        let message = if opened {
            format!("Mermaid preview opened at {location}")
        } else {
            format!("Mermaid preview ready at {location}")
        };
        self.state.notifier.info(&message);
        Ok(PanelHandle {
            session_id,
            location,
        })
    }
}

/// Platform opener and its leading arguments.
fn opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

/// Hands `location` to the system browser. `false` if the opener could not be started;
/// the caller still reports the address.
fn open_in_browser(location: &str) -> bool {
    let (program, args) = opener();
    match tokio::process::Command::new(program)
        .args(args)
        .arg(location)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => {
            tracing::info!(program, location, "Launched browser");
            true
        }
        Err(e) => {
            tracing::warn!(error = ?e, program, "Could not launch browser");
            false
        }
    }
}
