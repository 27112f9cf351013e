use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use termcast_terminal::{ManagerLimits, DEFAULT_COLS, DEFAULT_ROWS};

/// Server configuration, read once at startup from the environment
/// (`.env` honored via dotenvy before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    /// Default command spawned when a start request names none.
    pub command: String,
    pub cols: u16,
    pub rows: u16,
    pub queue_capacity: usize,
    pub history_max_bytes: usize,
    pub history_max_chunks: usize,
    /// JSON file holding the workspace allow-list.
    pub workspaces_file: PathBuf,
    /// Optional directory of static frontend assets.
    pub static_dir: Option<PathBuf>,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            command: env_or("TERMCAST_COMMAND", "bash"),
            cols: env_parse("TERMCAST_COLS", DEFAULT_COLS),
            rows: env_parse("TERMCAST_ROWS", DEFAULT_ROWS),
            queue_capacity: env_parse("TERMCAST_QUEUE_CAPACITY", 200),
            history_max_bytes: env_parse("TERMCAST_HISTORY_MAX_BYTES", 500_000),
            history_max_chunks: env_parse("TERMCAST_HISTORY_MAX_CHUNKS", 2_000),
            workspaces_file: PathBuf::from(env_or(
                "TERMCAST_WORKSPACES_FILE",
                "data/workspaces.json",
            )),
            static_dir: env::var("TERMCAST_STATIC_DIR").ok().map(PathBuf::from),
            bind_addr: env_parse(
                "TERMCAST_BIND",
                SocketAddr::from(([127, 0, 0, 1], 8700)),
            ),
        }
    }

    pub fn limits(&self) -> ManagerLimits {
        ManagerLimits {
            queue_capacity: self.queue_capacity,
            history_max_bytes: self.history_max_bytes,
            history_max_chunks: self.history_max_chunks,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
