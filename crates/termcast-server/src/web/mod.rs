// HTTP control surface and wire protocol
pub mod protocol;
pub mod routes;

pub use routes::{create_router, AppState};
