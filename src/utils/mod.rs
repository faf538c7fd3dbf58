//! Utility functions module
//!
//! Clock access, time formatting and signal handling shared by the daemon.

pub mod signals;
pub mod time;

// Re-export main functions
pub use signals::shutdown_signal;
pub use time::{format_elapsed, seconds_to_hours, split_hms, Clock, SystemClock};
