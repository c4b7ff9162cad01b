// Photo Organizer - pick, order and export photos under a numbered naming scheme
//
// This is the library crate containing the core logic and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod task;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::SettingsStore;
pub use models::{AppState, DisplayKey, Item, OrderedSelection};
pub use state::{StateChange, StateManager};
pub use task::{CooperativeTask, HostLoop, RerunPolicy, TaskError};
pub use ui::{Controller, EventQueue};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
