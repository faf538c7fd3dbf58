//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod session_runner;

// Re-export main types
pub use session_runner::{FinishOutcome, SessionRunner, TimerHandle, MIN_SESSION_SECS};
