use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::error::TerminalError;
use crate::history::HistoryBuffer;
use crate::queue::OutputQueue;
use crate::reader::OutputReader;
use crate::session::{PtySession, SpawnSpec};

/// Capacity knobs fixed at manager construction.
#[derive(Debug, Clone, Copy)]
pub struct ManagerLimits {
    pub queue_capacity: usize,
    pub history_max_bytes: usize,
    pub history_max_chunks: usize,
}

impl Default for ManagerLimits {
    fn default() -> Self {
        Self {
            queue_capacity: 200,
            history_max_bytes: 500_000,
            history_max_chunks: 2_000,
        }
    }
}

/// What `start` hands back on success.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub pid: Option<u32>,
    pub cols: u16,
    pub rows: u16,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusDimensions {
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

/// Point-in-time view of the manager, shaped for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub status: &'static str,
    pub pid: Option<u32>,
    pub uptime_seconds: u64,
    pub dimensions: StatusDimensions,
    pub session_id: Option<String>,
}

impl SessionStatus {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

struct ManagerState {
    session: Option<Arc<Mutex<PtySession>>>,
    reader: Option<OutputReader>,
    session_id: Option<String>,
    started_at: Option<Instant>,
}

/// The single source of truth for "is a process running".
///
/// One exclusive section serializes start/stop/write/resize/status against
/// each other. Blocking PTY reads never happen inside it; they live on the
/// reader thread, which shares only the history buffer and the queue.
pub struct PtyManager {
    state: Mutex<ManagerState>,
    history: Arc<Mutex<HistoryBuffer>>,
    queue: Arc<OutputQueue>,
}

impl PtyManager {
    pub fn new(limits: ManagerLimits) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                session: None,
                reader: None,
                session_id: None,
                started_at: None,
            }),
            history: Arc::new(Mutex::new(HistoryBuffer::new(
                limits.history_max_bytes,
                limits.history_max_chunks,
            ))),
            queue: Arc::new(OutputQueue::new(limits.queue_capacity)),
        }
    }

    /// The queue the connection broadcaster consumes from.
    pub fn queue(&self) -> Arc<OutputQueue> {
        Arc::clone(&self.queue)
    }

    fn session_alive(state: &ManagerState) -> bool {
        match &state.session {
            Some(session) => match session.lock() {
                Ok(mut session) => session.is_alive(),
                Err(_) => false,
            },
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        let state = self.state.lock().unwrap();
        Self::session_alive(&state)
    }

    /// Spawn a new session and its output reader.
    ///
    /// History and queue are cleared before the spawn so a viewer never
    /// sees output from two different sessions interleaved. On spawn
    /// failure everything rolls back to not-running.
    pub fn start(&self, spec: SpawnSpec) -> Result<SessionHandle, TerminalError> {
        let mut state = self.state.lock().unwrap();

        if Self::session_alive(&state) {
            return Err(TerminalError::AlreadyRunning);
        }

        // A previous session may be present but dead; retire its reader
        // before anything else.
        if let Some(reader) = state.reader.take() {
            reader.request_stop();
        }
        state.session = None;
        state.session_id = None;
        state.started_at = None;

        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
        self.queue.clear();

        let mut session = PtySession::new(spec);
        session.start()?;

        // The child is already running here; if taking the reader fails,
        // kill it rather than abandon it.
        let output = match session.output() {
            Ok(output) => output,
            Err(e) => {
                let _ = session.stop(true);
                return Err(e);
            }
        };
        let pid = session.pid();
        let (cols, rows) = session.dimensions();
        let session = Arc::new(Mutex::new(session));

        let reader = OutputReader::spawn(
            Arc::clone(&session),
            output,
            Arc::clone(&self.history),
            Arc::clone(&self.queue),
        );

        let session_id = Uuid::new_v4().to_string();
        state.session = Some(session);
        state.reader = Some(reader);
        state.session_id = Some(session_id.clone());
        state.started_at = Some(Instant::now());

        tracing::info!(pid = ?pid, session_id = %session_id, "pty session started");

        Ok(SessionHandle {
            session_id,
            pid,
            cols,
            rows,
        })
    }

    /// Stop the reader, then the session, then clear the descriptor.
    /// Idempotent; a failed termination still clears all state.
    pub fn stop(&self, force: bool) -> Result<(), TerminalError> {
        let mut state = self.state.lock().unwrap();

        let Some(session) = state.session.take() else {
            return Ok(());
        };

        if let Some(reader) = state.reader.as_ref() {
            reader.request_stop();
        }

        let result = match session.lock() {
            Ok(mut session) => session.stop(force),
            Err(_) => Ok(()),
        };
        // Closing the PTY above unblocks the reader with EOF, so joining
        // here is bounded.
        drop(session);
        if let Some(reader) = state.reader.take() {
            reader.join();
        }

        state.session_id = None;
        state.started_at = None;

        tracing::info!(force, "pty session stopped");
        result
    }

    /// Forward raw input to the process. No-op unless a session is alive.
    pub fn write(&self, data: &str) -> Result<(), TerminalError> {
        let state = self.state.lock().unwrap();
        if let Some(session) = &state.session {
            if let Ok(mut session) = session.lock() {
                if session.is_alive() {
                    session.write(data)?;
                }
            }
        }
        Ok(())
    }

    /// Resize the terminal. No-op when no session object exists at all; a
    /// session that exists but is not alive still records the requested
    /// size.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), TerminalError> {
        let state = self.state.lock().unwrap();
        if let Some(session) = &state.session {
            if let Ok(mut session) = session.lock() {
                session.resize(cols, rows)?;
            }
        }
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.lock().unwrap();
        let running = Self::session_alive(&state);

        let (pid, dimensions) = match &state.session {
            Some(session) => match session.lock() {
                Ok(session) => {
                    let (cols, rows) = session.dimensions();
                    (
                        if running { session.pid() } else { None },
                        StatusDimensions {
                            cols: Some(cols),
                            rows: Some(rows),
                        },
                    )
                }
                Err(_) => (None, StatusDimensions { cols: None, rows: None }),
            },
            None => (None, StatusDimensions { cols: None, rows: None }),
        };

        let uptime_seconds = match (running, state.started_at) {
            (true, Some(started_at)) => started_at.elapsed().as_secs(),
            _ => 0,
        };

        SessionStatus {
            status: if running { "running" } else { "stopped" },
            pid,
            uptime_seconds,
            dimensions,
            session_id: state.session_id.clone(),
        }
    }

    /// Immutable copy of the retained output, oldest first.
    pub fn history_snapshot(&self) -> Vec<String> {
        let _state = self.state.lock().unwrap();
        match self.history.lock() {
            Ok(history) => history.snapshot(),
            Err(_) => Vec::new(),
        }
    }

    /// Process-wide teardown.
    pub fn shutdown(&self) -> Result<(), TerminalError> {
        self.stop(true)
    }
}
