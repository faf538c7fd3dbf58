//! Clock source and elapsed-time formatting

use chrono::{DateTime, Utc};

/// Wall-clock reader used to stamp completed sessions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Split whole seconds into zero-padded hour, minute and second fields
pub fn split_hms(total_seconds: u64) -> (String, String, String) {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    (pad(hours), pad(minutes), pad(seconds))
}

/// Render whole seconds as `HH:MM:SS`
pub fn format_elapsed(total_seconds: u64) -> String {
    let (hours, minutes, seconds) = split_hms(total_seconds);
    format!("{}:{}:{}", hours, minutes, seconds)
}

/// Convert seconds to hours, rounded to two decimals
pub fn seconds_to_hours(total_seconds: u64) -> f32 {
    let hours = total_seconds as f64 / 3600.0;
    ((hours * 100.0).round() / 100.0) as f32
}

/// Human-readable duration used for the daemon uptime
pub fn format_uptime(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn pad(value: u64) -> String {
    format!("{:02}", value)
}
