//! External collaborator module
//!
//! Presenters the session runner reports to while a session is live.

pub mod notification;

// Re-export main types
pub use notification::{LogPresenter, NotificationPresenter};
#[cfg(test)]
pub use notification::RecordingPresenter;
