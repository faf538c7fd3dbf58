//! StudySmart - A local study tracker daemon
//!
//! This library tracks study subjects, tasks and finished study sessions in
//! SQLite, and runs a background study-session timer that keeps counting
//! whether or not any client is watching it.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod stats;
pub mod storage;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{Result, StudyError};
pub use state::AppState;
pub use storage::Database;
pub use tasks::{SessionRunner, TimerHandle};
pub use utils::signals::shutdown_signal;
