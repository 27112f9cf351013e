use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use termcast_terminal::{map_special_key, strip_terminal_identity_responses};

use crate::web::protocol::{ClientMessage, ServerMessage};
use crate::web::routes::AppState;

/// GET /ws/terminal - viewer streaming endpoint
pub async fn terminal_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One viewer connection: replay history and current status, then serve
/// the inbound message loop until the socket closes. Outbound traffic
/// travels through the per-connection channel registered with the
/// ConnectionManager, so broadcasting never waits on this loop.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    let (sender, mut outbound) = mpsc::unbounded_channel();
    state.connections.connect(id, sender).await;

    let (mut sink, mut stream) = socket.split();

    // Forward the connection's channel into the socket sink.
    let forward = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(WsMessage::Text(json)).await.is_err() {
                break;
            }
        }
    });

    send_attach_sequence(&state, id).await;

    while let Some(Ok(message)) = stream.next().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let Some(message) = ClientMessage::parse(&text) else {
            continue;
        };
        dispatch_client_message(&state, id, message).await;
    }

    state.connections.disconnect(id).await;
    forward.abort();
}

/// Attaching: full history snapshot in original order, then the current
/// status. Live output follows through the broadcaster.
async fn send_attach_sequence(state: &AppState, id: Uuid) {
    for chunk in state.manager.history_snapshot() {
        let cleaned = strip_terminal_identity_responses(&chunk);
        if cleaned.is_empty() {
            continue;
        }
        if state
            .connections
            .send_to(id, ServerMessage::output(cleaned))
            .await
            .is_err()
        {
            return;
        }
    }
    let status = state.manager.status();
    let _ = state
        .connections
        .send_to(id, ServerMessage::status(status.status, status.pid, None))
        .await;
}

/// Translate one inbound viewer message into a manager call.
async fn dispatch_client_message(state: &AppState, id: Uuid, message: ClientMessage) {
    match message {
        ClientMessage::Input { data } => {
            let cleaned = strip_terminal_identity_responses(&data);
            if cleaned.is_empty() {
                return;
            }
            if let Err(e) = state.manager.write(&cleaned) {
                tracing::warn!("failed to write viewer input: {e}");
            }
        }
        ClientMessage::Resize { cols, rows } => {
            let (Ok(cols), Ok(rows)) = (u16::try_from(cols), u16::try_from(rows)) else {
                return;
            };
            if cols == 0 || rows == 0 {
                return;
            }
            if let Err(e) = state.manager.resize(cols, rows) {
                tracing::warn!("failed to resize terminal: {e}");
            }
        }
        ClientMessage::SpecialKey { key, modifiers } => {
            let seq = map_special_key(&key, &modifiers);
            if seq.is_empty() {
                return;
            }
            if let Err(e) = state.manager.write(seq) {
                tracing::warn!("failed to write special key: {e}");
            }
        }
        ClientMessage::Ping => {
            let _ = state.connections.send_to(id, ServerMessage::Pong {}).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use termcast_terminal::{ManagerLimits, PtyManager};
    use tokio::time::timeout;

    use crate::config::Config;
    use crate::workspaces::WorkspaceStore;
    use crate::ws::ConnectionManager;

    fn test_state() -> AppState {
        let config = Config {
            command: "sh".to_string(),
            cols: 80,
            rows: 24,
            queue_capacity: 16,
            history_max_bytes: 4096,
            history_max_chunks: 32,
            workspaces_file: PathBuf::from("/nonexistent/workspaces.json"),
            static_dir: None,
            bind_addr: ([127, 0, 0, 1], 0).into(),
        };
        let manager = Arc::new(PtyManager::new(ManagerLimits {
            queue_capacity: config.queue_capacity,
            history_max_bytes: config.history_max_bytes,
            history_max_chunks: config.history_max_chunks,
        }));
        AppState {
            connections: Arc::new(ConnectionManager::new(manager.queue())),
            workspaces: Arc::new(WorkspaceStore::new(config.workspaces_file.clone())),
            manager,
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn ping_gets_a_pong_reply() {
        let state = test_state();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.connections.connect(id, tx).await;

        dispatch_client_message(&state, id, ClientMessage::Ping).await;

        match timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(ServerMessage::Pong {})) => {}
            other => panic!("expected pong, got {other:?}"),
        }
        state.connections.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn attach_replays_history_then_status_then_live_output() {
        use termcast_terminal::SpawnSpec;

        let state = test_state();
        let mut spec = SpawnSpec::new("sh");
        spec.args = vec!["-c".to_string(), "printf 'attach-marker'".to_string()];
        state.manager.start(spec).unwrap();

        let mut produced = false;
        for _ in 0..250 {
            if state
                .manager
                .history_snapshot()
                .concat()
                .contains("attach-marker")
            {
                produced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(produced, "child output never reached history");

        // Joining the reader via stop guarantees nothing feeds the queue
        // anymore, so clearing it leaves only our own live chunk below.
        state.manager.stop(true).unwrap();
        state.manager.queue().clear();

        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.connections.connect(id, tx).await;
        send_attach_sequence(&state, id).await;

        // Everything before the status message must be replayed output.
        let mut replayed = String::new();
        loop {
            match timeout(Duration::from_secs(1), rx.recv()).await {
                Ok(Some(ServerMessage::Output { data })) => replayed.push_str(&data),
                Ok(Some(ServerMessage::Status { status, .. })) => {
                    assert_eq!(status, "stopped");
                    break;
                }
                other => panic!("expected output or status, got {other:?}"),
            }
        }
        assert!(replayed.contains("attach-marker"), "got: {replayed:?}");

        // Live output arrives only after the attach sequence, through the
        // broadcaster loop.
        state.manager.queue().push("live-chunk".to_string());
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(ServerMessage::Output { data })) => assert_eq!(data, "live-chunk"),
            other => panic!("expected live output, got {other:?}"),
        }

        state.connections.shutdown().await;
    }
}
