use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use termcast_terminal::{PtyManager, SpawnSpec, TerminalError};

use crate::config::Config;
use crate::web::protocol::ServerMessage;
use crate::workspaces::WorkspaceStore;
use crate::ws::{terminal_ws, ConnectionManager};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PtyManager>,
    pub connections: Arc<ConnectionManager>,
    pub workspaces: Arc<WorkspaceStore>,
    pub config: Arc<Config>,
}

/// Create router with the terminal control surface and the streaming
/// endpoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/terminal/start", post(start_terminal))
        .route("/api/terminal/restart", post(restart_terminal))
        .route("/api/terminal/stop", post(stop_terminal))
        .route("/api/terminal/status", get(terminal_status))
        .route("/ws/terminal", get(terminal_ws))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub force: bool,
}

/// POST /api/terminal/start
async fn start_terminal(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    launch(&state, req).await
}

/// POST /api/terminal/restart - stop-if-running, then start
async fn restart_terminal(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.manager.is_running() {
        stop_manager(&state, true).await;
        state
            .connections
            .broadcast(ServerMessage::status("stopped", None, Some("Process stopped")))
            .await;
    }
    launch(&state, req).await
}

/// POST /api/terminal/stop
async fn stop_terminal(
    State(state): State<AppState>,
    Json(req): Json<StopRequest>,
) -> Json<serde_json::Value> {
    stop_manager(&state, req.force).await;
    state
        .connections
        .broadcast(ServerMessage::status("stopped", None, Some("Process stopped")))
        .await;
    Json(json!({ "success": true, "status": "stopped" }))
}

/// GET /api/terminal/status
async fn terminal_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.manager.status()).unwrap_or_else(|_| json!({})))
}

/// Shared start path for `start` and `restart`.
async fn launch(
    state: &AppState,
    req: StartRequest,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(cwd) = &req.cwd {
        if !state.workspaces.is_allowed(cwd) {
            return Err(ApiError::BadRequest(
                "cwd is not in the allowed workspaces".to_string(),
            ));
        }
    }

    let spec = SpawnSpec {
        command: req
            .command
            .unwrap_or_else(|| state.config.command.clone()),
        args: req.args,
        cwd: req.cwd,
        cols: req.cols.filter(|c| *c > 0).unwrap_or(state.config.cols),
        rows: req.rows.filter(|r| *r > 0).unwrap_or(state.config.rows),
    };

    let manager = Arc::clone(&state.manager);
    let result = tokio::task::spawn_blocking(move || manager.start(spec))
        .await
        .map_err(|e| ApiError::Internal(format!("start task failed: {e}")))?;

    match result {
        Ok(handle) => {
            state
                .connections
                .broadcast(ServerMessage::status(
                    "running",
                    handle.pid,
                    Some("Process started"),
                ))
                .await;
            Ok(Json(json!({
                "success": true,
                "session_id": handle.session_id,
                "status": "running",
                "pid": handle.pid,
            })))
        }
        Err(TerminalError::AlreadyRunning) => {
            Err(ApiError::BadRequest("session already running".to_string()))
        }
        Err(e) => Err(ApiError::Internal(format!("failed to start session: {e}"))),
    }
}

/// `stop` blocks through the grace interval, so it runs off the async
/// threads. Termination failures are logged, never surfaced: state is
/// cleared regardless.
async fn stop_manager(state: &AppState, force: bool) {
    let manager = Arc::clone(&state.manager);
    match tokio::task::spawn_blocking(move || manager.stop(force)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("terminal stop was incomplete: {e}"),
        Err(e) => tracing::warn!("stop task failed: {e}"),
    }
}

/// Structured error responses for the control surface.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
