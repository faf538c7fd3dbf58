//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::responses::{
    ApiError, FinishResponse, HealthResponse, MessageResponse, StatusResponse, TimerResponse,
};
use crate::{
    error::{Result, StudyError},
    models::{Priority, Session, Subject, Task},
    state::{AppState, SubjectRef},
    stats::{self, Dashboard, SubjectOverview},
    storage::{Database, SessionStore},
    tasks::FinishOutcome,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

const DEFAULT_SESSION_LIMIT: u32 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub subject_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub limit: Option<u32>,
}

/// Task body for create and update
///
/// `is_complete` is left alone on update unless the body sets it.
#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub subject_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date_millis: i64,
    #[serde(default)]
    pub priority: Priority,
    pub is_complete: Option<bool>,
}

impl TaskRequest {
    fn into_task(self, id: Option<i64>) -> Task {
        Task {
            id,
            subject_id: self.subject_id,
            title: self.title,
            description: self.description,
            due_date_millis: self.due_date_millis,
            priority: self.priority,
            related_to_subject: String::new(),
            is_complete: self.is_complete.unwrap_or_default(),
        }
    }
}

/// Run database work on the blocking pool
///
/// rusqlite calls block, so handlers never run them on an async worker.
async fn with_db<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T> + Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || work(&db))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

// ── Timer ────────────────────────────────────────────────────────────

/// Handle GET /timer - Current timer snapshot
pub async fn timer_handler(State(state): State<Arc<AppState>>) -> Json<TimerResponse> {
    Json(TimerResponse::ok("Current timer", state.timer.snapshot()))
}

/// Handle POST /timer/start - Start or resume the study session
///
/// A subject must be chosen before the timer starts; resuming keeps the
/// subject already attached unless a new one is given.
pub async fn timer_start_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<TimerResponse> {
    // An empty body resumes with the attached subject
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice::<StartRequest>(&body)
            .map_err(|e| StudyError::validation("body", e.to_string()))?
    };

    let subject = match request.subject_id {
        Some(id) => {
            let subject = with_db(&state, move |db| db.get_subject(id)).await?;
            Some(SubjectRef {
                id,
                name: subject.name,
            })
        }
        None => None,
    };
    if subject.is_none() && state.timer.snapshot().subject.is_none() {
        return Err(StudyError::validation(
            "subject_id",
            "select a subject before starting a session",
        )
        .into());
    }

    let snapshot = state.timer.start(subject).await?;
    state.record_action("timer-start");
    Ok(Json(TimerResponse::ok("Study session running", snapshot)))
}

/// Handle POST /timer/stop - Pause the study session
pub async fn timer_stop_handler(State(state): State<Arc<AppState>>) -> ApiResult<TimerResponse> {
    let snapshot = state.timer.stop().await?;
    state.record_action("timer-stop");
    Ok(Json(TimerResponse::ok("Study session paused", snapshot)))
}

/// Handle POST /timer/cancel - Discard the study session
pub async fn timer_cancel_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<TimerResponse> {
    let discarded = state.timer.cancel().await?;
    state.record_action("timer-cancel");
    Ok(Json(TimerResponse::ok(
        format!("Study session cancelled ({}s discarded)", discarded),
        state.timer.snapshot(),
    )))
}

/// Handle POST /timer/finish - End the study session and save it
pub async fn timer_finish_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<FinishResponse> {
    let outcome = state.timer.finish().await?;
    state.record_action("timer-finish");

    let response = FinishResponse::new(outcome, state.timer.snapshot());
    if let FinishOutcome::SaveFailed { .. } = response.outcome {
        state.add_notice(response.message.clone());
    }
    Ok(Json(response))
}

// ── Status ───────────────────────────────────────────────────────────

/// Handle GET /status - Timer, notices and server metadata
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();
    Json(StatusResponse {
        timer: state.timer.snapshot(),
        notices: state.notices(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle DELETE /notices - Dismiss all notices
pub async fn clear_notices_handler(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    let cleared = state.clear_notices();
    Json(MessageResponse::ok(format!("Cleared {} notices", cleared)))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Handle GET /dashboard - Totals, subjects, upcoming tasks and recent sessions
pub async fn dashboard_handler(State(state): State<Arc<AppState>>) -> ApiResult<Dashboard> {
    Ok(Json(with_db(&state, stats::dashboard).await?))
}

// ── Subjects ─────────────────────────────────────────────────────────

pub async fn list_subjects_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Subject>> {
    Ok(Json(with_db(&state, Database::list_subjects).await?))
}

pub async fn create_subject_handler(
    State(state): State<Arc<AppState>>,
    Json(mut subject): Json<Subject>,
) -> Result<(StatusCode, Json<Subject>), ApiError> {
    subject.validate()?;
    subject.id = None;
    let subject = with_db(&state, move |db| {
        subject.id = Some(db.upsert_subject(&subject)?);
        Ok(subject)
    })
    .await?;
    state.record_action("subject-create");
    info!("Subject saved: {}", subject.name);
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn get_subject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Subject> {
    Ok(Json(with_db(&state, move |db| db.get_subject(id)).await?))
}

pub async fn update_subject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(mut subject): Json<Subject>,
) -> ApiResult<Subject> {
    subject.validate()?;
    subject.id = Some(id);
    let subject = with_db(&state, move |db| {
        db.get_subject(id)?;
        db.upsert_subject(&subject)?;
        Ok(subject)
    })
    .await?;
    state.record_action("subject-update");
    Ok(Json(subject))
}

pub async fn delete_subject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    if state.timer.snapshot().subject.is_some_and(|s| s.id == id) {
        warn!("Deleting subject {} while its session is in progress", id);
    }
    with_db(&state, move |db| db.delete_subject(id)).await?;
    state.record_action("subject-delete");
    Ok(Json(MessageResponse::ok("Subject deleted successfully.")))
}

pub async fn subject_overview_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<SubjectOverview> {
    Ok(Json(
        with_db(&state, move |db| stats::subject_overview(db, id)).await?,
    ))
}

// ── Tasks ────────────────────────────────────────────────────────────

pub async fn list_tasks_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Task>> {
    Ok(Json(with_db(&state, Database::upcoming_tasks).await?))
}

pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let mut task = request.into_task(None);
    task.validate()?;
    let task = with_db(&state, move |db| {
        task.related_to_subject = db.get_subject(task.subject_id)?.name;
        task.id = Some(db.upsert_task(&task)?);
        Ok(task)
    })
    .await?;
    state.record_action("task-create");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Task> {
    Ok(Json(with_db(&state, move |db| db.get_task(id)).await?))
}

pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<TaskRequest>,
) -> ApiResult<Task> {
    let keep_completion = request.is_complete.is_none();
    let mut task = request.into_task(Some(id));
    task.validate()?;
    let task = with_db(&state, move |db| {
        let stored = db.get_task(id)?;
        if keep_completion {
            task.is_complete = stored.is_complete;
        }
        task.related_to_subject = db.get_subject(task.subject_id)?.name;
        db.upsert_task(&task)?;
        Ok(task)
    })
    .await?;
    state.record_action("task-update");
    Ok(Json(task))
}

pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    with_db(&state, move |db| db.delete_task(id)).await?;
    state.record_action("task-delete");
    Ok(Json(MessageResponse::ok("Task deleted successfully.")))
}

/// Handle POST /tasks/:id/toggle - Flip completion
pub async fn toggle_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Task> {
    let task = with_db(&state, move |db| db.toggle_task(id)).await?;
    state.record_action("task-toggle");
    Ok(Json(task))
}

// ── Sessions ─────────────────────────────────────────────────────────

pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Vec<Session>> {
    let limit = query.limit.unwrap_or(DEFAULT_SESSION_LIMIT);
    Ok(Json(
        with_db(&state, move |db| db.recent_sessions(limit)).await?,
    ))
}

pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    with_db(&state, move |db| db.delete_session(id)).await?;
    state.record_action("session-delete");
    Ok(Json(MessageResponse::ok("Session deleted successfully")))
}
