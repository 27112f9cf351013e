// PTY session core
//
// This crate owns the single terminal process: spawning it inside a PTY,
// draining its output on a dedicated thread into bounded history and a
// bounded distribution queue, and serializing all lifecycle operations
// behind one manager. It knows nothing about HTTP or WebSockets.

mod error;
mod history;
mod keymap;
mod manager;
mod queue;
mod reader;
mod sanitize;
mod session;

// Re-export public API
pub use error::TerminalError;
pub use history::HistoryBuffer;
pub use keymap::map_special_key;
pub use manager::{ManagerLimits, PtyManager, SessionHandle, SessionStatus, StatusDimensions};
pub use queue::OutputQueue;
pub use reader::OutputReader;
pub use sanitize::strip_terminal_identity_responses;
pub use session::{PtySession, SessionOutput, SpawnSpec};

// Constants
pub const READ_CHUNK_BYTES: usize = 4096;
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;
