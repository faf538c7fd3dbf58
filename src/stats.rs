//! Derived study statistics for the dashboard and subject views

use serde::Serialize;

use crate::{
    error::Result,
    models::{Session, Subject, Task},
    storage::Database,
    utils::seconds_to_hours,
};

/// Sessions shown on the dashboard
pub const DASHBOARD_RECENT_SESSIONS: u32 = 5;
/// Sessions shown on a subject overview
pub const SUBJECT_RECENT_SESSIONS: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub total_subject_count: u64,
    pub total_goal_study_hours: f32,
    pub total_studied_hours: f32,
    pub subjects: Vec<Subject>,
    pub upcoming_tasks: Vec<Task>,
    pub recent_sessions: Vec<Session>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectOverview {
    pub subject: Subject,
    pub studied_hours: f32,
    /// Fraction of the goal reached, within 0..=1
    pub progress: f32,
    pub upcoming_tasks: Vec<Task>,
    pub completed_tasks: Vec<Task>,
    pub recent_sessions: Vec<Session>,
}

/// Studied hours over goal hours, clamped to `0.0..=1.0`
///
/// A non-positive goal counts as one hour.
pub fn goal_progress(studied_hours: f32, goal_hours: f32) -> f32 {
    let goal = if goal_hours > 0.0 { goal_hours } else { 1.0 };
    (studied_hours / goal).clamp(0.0, 1.0)
}

pub fn dashboard(db: &Database) -> Result<Dashboard> {
    Ok(Dashboard {
        total_subject_count: db.subject_count()?,
        total_goal_study_hours: db.total_goal_hours()?,
        total_studied_hours: seconds_to_hours(db.total_session_duration()?),
        subjects: db.list_subjects()?,
        upcoming_tasks: db.upcoming_tasks()?,
        recent_sessions: db.recent_sessions(DASHBOARD_RECENT_SESSIONS)?,
    })
}

pub fn subject_overview(db: &Database, subject_id: i64) -> Result<SubjectOverview> {
    let subject = db.get_subject(subject_id)?;
    let studied_hours = seconds_to_hours(db.total_session_duration_for_subject(subject_id)?);
    Ok(SubjectOverview {
        progress: goal_progress(studied_hours, subject.goal_hours),
        studied_hours,
        upcoming_tasks: db.upcoming_tasks_for_subject(subject_id)?,
        completed_tasks: db.completed_tasks_for_subject(subject_id)?,
        recent_sessions: db.recent_sessions_for_subject(subject_id, SUBJECT_RECENT_SESSIONS)?,
        subject,
    })
}
