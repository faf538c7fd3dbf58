//! Live elapsed-time notification

#[cfg(test)]
use std::sync::Mutex;

use tracing::{debug, info};

/// Renders the running session's elapsed time. Fire-and-forget.
pub trait NotificationPresenter: Send + Sync {
    fn publish(&self, elapsed_text: &str);

    /// Called once the session has ended
    fn dismiss(&self) {}
}

/// Presenter that writes the ongoing notification to the log
#[derive(Debug)]
pub struct LogPresenter {
    title: String,
}

impl LogPresenter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for LogPresenter {
    fn default() -> Self {
        Self::new("Study Session")
    }
}

impl NotificationPresenter for LogPresenter {
    fn publish(&self, elapsed_text: &str) {
        debug!("[{}] {}", self.title, elapsed_text);
    }

    fn dismiss(&self) {
        info!("[{}] notification dismissed", self.title);
    }
}

/// Presenter that keeps every published text, for inspection
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    published: Mutex<Vec<String>>,
    dismissed: Mutex<usize>,
}

#[cfg(test)]
impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn dismiss_count(&self) -> usize {
        self.dismissed.lock().map(|d| *d).unwrap_or_default()
    }
}

#[cfg(test)]
impl NotificationPresenter for RecordingPresenter {
    fn publish(&self, elapsed_text: &str) {
        if let Ok(mut published) = self.published.lock() {
            published.push(elapsed_text.to_string());
        }
    }

    fn dismiss(&self) {
        if let Ok(mut dismissed) = self.dismissed.lock() {
            *dismissed += 1;
        }
    }
}
