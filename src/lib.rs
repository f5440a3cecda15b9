pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::ModelRegistry;
pub use app::{AppState, SharedState};
pub use config::TomlConfig;
pub use core::structural::extract_structural;
pub use utils::error::{GuardError, Result};
