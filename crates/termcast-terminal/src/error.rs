use thiserror::Error;

/// Errors surfaced by the PTY core.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// A session is already alive; `start` refuses to replace it.
    #[error("session already running")]
    AlreadyRunning,

    /// The PTY facility or the command itself could not be launched.
    #[error("failed to spawn pty process: {0}")]
    Spawn(String),

    /// The process closed its output permanently. Not a failure; the
    /// reader loop treats it as its normal termination signal.
    #[error("pty output stream closed")]
    EndOfStream,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
