//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.
//! The timer routes are the command trigger for the session runner.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timer", get(timer_handler))
        .route("/timer/start", post(timer_start_handler))
        .route("/timer/stop", post(timer_stop_handler))
        .route("/timer/cancel", post(timer_cancel_handler))
        .route("/timer/finish", post(timer_finish_handler))
        .route("/dashboard", get(dashboard_handler))
        .route(
            "/subjects",
            get(list_subjects_handler).post(create_subject_handler),
        )
        .route(
            "/subjects/:id",
            get(get_subject_handler)
                .put(update_subject_handler)
                .delete(delete_subject_handler),
        )
        .route("/subjects/:id/overview", get(subject_overview_handler))
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/tasks/:id",
            get(get_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .route("/tasks/:id/toggle", post(toggle_task_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/:id", delete(delete_session_handler))
        .route("/notices", delete(clear_notices_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
