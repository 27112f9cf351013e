// WebSocket streaming surface
pub mod handler;
pub mod manager;

pub use handler::terminal_ws;
pub use manager::ConnectionManager;
