//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{error::StudyError, state::TimerSnapshot, tasks::FinishOutcome};

/// Response for timer commands and queries
#[derive(Debug, Clone, Serialize)]
pub struct TimerResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerSnapshot,
}

impl TimerResponse {
    pub fn ok(message: impl Into<String>, timer: TimerSnapshot) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            timer,
        }
    }
}

/// Response for a finished session
#[derive(Debug, Clone, Serialize)]
pub struct FinishResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: FinishOutcome,
    pub timer: TimerSnapshot,
}

impl FinishResponse {
    pub fn new(outcome: FinishOutcome, timer: TimerSnapshot) -> Self {
        let (status, message) = match &outcome {
            FinishOutcome::Saved { .. } => ("saved", "Session saved successfully".to_string()),
            FinishOutcome::Discarded { reason, .. } => {
                ("discarded", format!("Session not saved: {}", reason))
            }
            FinishOutcome::SaveFailed { error, .. } => {
                ("error", format!("Couldn't save session. {}", error))
            }
        };
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            outcome,
            timer,
        }
    }
}

/// Status response with timer and notice information
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timer: TimerSnapshot,
    pub notices: Vec<String>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Acknowledgement for deletions and similar actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }
}

/// JSON error body with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// A failure outside the domain, such as a panicked blocking task
    pub fn internal(err: impl std::fmt::Display) -> Self {
        error!("Request failed: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        let status = match &err {
            StudyError::NotFound { .. } => StatusCode::NOT_FOUND,
            StudyError::Validation { .. } => StatusCode::BAD_REQUEST,
            StudyError::InvalidTransition { .. } => StatusCode::CONFLICT,
            StudyError::RunnerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            StudyError::Database(_) | StudyError::LockPoisoned => {
                error!("Request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = MessageResponse {
            status: "error".to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
