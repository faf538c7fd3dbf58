//! Shared application state handed to every request handler

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{storage::Database, tasks::TimerHandle, utils::time::format_uptime};

/// Store, timer handle and bookkeeping shared across handlers
pub struct AppState {
    /// Subjects, tasks and sessions
    pub db: Arc<Database>,
    /// Handle to the background session runner
    pub timer: TimerHandle,
    /// User-facing failure messages, newest last
    pub notices: Arc<Mutex<Vec<String>>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(db: Arc<Database>, timer: TimerHandle, port: u16, host: String) -> Self {
        Self {
            db,
            timer,
            notices: Arc::new(Mutex::new(Vec::new())),
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Remember the most recent mutating action
    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Record a failure the user should see
    pub fn add_notice(&self, notice: impl Into<String>) {
        let notice = notice.into();
        warn!("Adding notice: {}", notice);
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }

    /// Drop all notices, returning how many were cleared
    pub fn clear_notices(&self) -> usize {
        let cleared = self
            .notices
            .lock()
            .map(|mut notices| notices.drain(..).count())
            .unwrap_or_default();
        if cleared > 0 {
            info!("Cleared {} notices", cleared);
        }
        cleared
    }

    /// Server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        format_uptime(self.start_time.elapsed().as_secs())
    }

    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::LogPresenter, tasks::SessionRunner};

    #[tokio::test]
    async fn notices_accumulate_and_clear() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let timer = SessionRunner::new(db.clone(), Arc::new(LogPresenter::default())).spawn();
        let state = AppState::new(db, timer, 0, "127.0.0.1".to_string());

        state.add_notice("first");
        state.add_notice("second");
        assert_eq!(state.notices(), vec!["first", "second"]);
        assert_eq!(state.clear_notices(), 2);
        assert!(state.notices().is_empty());

        state.record_action("timer-start");
        let (action, time) = state.get_last_action();
        assert_eq!(action.as_deref(), Some("timer-start"));
        assert!(time.is_some());
    }
}
