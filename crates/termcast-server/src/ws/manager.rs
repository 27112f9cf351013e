use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use termcast_terminal::OutputQueue;

use crate::web::protocol::ServerMessage;

/// How long the broadcaster loop waits on the queue before re-checking
/// its stop signal.
const BROADCAST_POLL: Duration = Duration::from_millis(200);

type Registry = Arc<Mutex<HashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>>>;

/// Registry of attached viewers plus the single loop fanning the output
/// queue out to all of them.
///
/// Each viewer is represented by the sending half of its per-connection
/// channel; a dedicated task per connection forwards that channel into the
/// actual WebSocket sink. A send that fails means the connection's
/// forwarding task is gone, and the entry is pruned.
pub struct ConnectionManager {
    registry: Registry,
    queue: Arc<OutputQueue>,
    broadcaster: Mutex<Option<JoinHandle<()>>>,
    stop: CancellationToken,
}

impl ConnectionManager {
    pub fn new(queue: Arc<OutputQueue>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            queue,
            broadcaster: Mutex::new(None),
            stop: CancellationToken::new(),
        }
    }

    /// Register a viewer and make sure the broadcaster loop is running.
    /// Starting the loop is idempotent; a second connect while it is alive
    /// does nothing extra.
    pub async fn connect(&self, id: Uuid, sender: mpsc::UnboundedSender<ServerMessage>) {
        self.registry.lock().await.insert(id, sender);
        self.ensure_broadcaster().await;
        tracing::debug!(%id, "viewer connected");
    }

    /// Deregister a viewer. Safe to call repeatedly or for an id that was
    /// never registered.
    pub async fn disconnect(&self, id: Uuid) {
        if self.registry.lock().await.remove(&id).is_some() {
            tracing::debug!(%id, "viewer disconnected");
        }
    }

    /// Direct send to one viewer; the failure propagates so the caller can
    /// abandon a replay mid-way.
    pub async fn send_to(&self, id: Uuid, message: ServerMessage) -> anyhow::Result<()> {
        let sender = self
            .registry
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection {id} is not registered"))?;
        sender
            .send(message)
            .map_err(|_| anyhow::anyhow!("connection {id} closed"))
    }

    /// Fan a message out to a snapshot of all viewers, pruning every
    /// connection whose channel has closed.
    pub async fn broadcast(&self, message: ServerMessage) {
        broadcast_to(&self.registry, message).await;
    }

    async fn ensure_broadcaster(&self) {
        let mut slot = self.broadcaster.lock().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        let registry = Arc::clone(&self.registry);
        let queue = Arc::clone(&self.queue);
        let stop = self.stop.clone();
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    chunk = queue.recv(BROADCAST_POLL) => {
                        let Some(chunk) = chunk else { continue };
                        broadcast_to(&registry, ServerMessage::output(chunk)).await;
                    }
                }
            }
            tracing::debug!("broadcaster loop stopped");
        }));
    }

    /// Signal the loop to stop and wait for it. Invoked once at process
    /// shutdown.
    pub async fn shutdown(&self) {
        self.stop.cancel();
        if let Some(handle) = self.broadcaster.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn broadcast_to(registry: &Registry, message: ServerMessage) {
    let targets: Vec<(Uuid, mpsc::UnboundedSender<ServerMessage>)> = {
        let registry = registry.lock().await;
        registry.iter().map(|(id, tx)| (*id, tx.clone())).collect()
    };

    let mut dead = Vec::new();
    for (id, sender) in targets {
        if sender.send(message.clone()).is_err() {
            dead.push(id);
        }
    }

    if !dead.is_empty() {
        let mut registry = registry.lock().await;
        for id in &dead {
            registry.remove(id);
        }
        tracing::debug!(count = dead.len(), "pruned dead viewer connections");
    }
}
