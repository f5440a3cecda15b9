// App layer: HTTP surface and request-scoped media handling.

pub mod media;
pub mod routes;
pub mod state;

pub use routes::{router, serve};
pub use state::{AppState, SharedState};
