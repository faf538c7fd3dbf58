//! Local relational store for subjects, tasks and sessions
//!
//! The session runner only sees the [`SessionStore`] seam; everything else
//! talks to [`Database`] directly.

pub mod database;

pub use database::Database;

use crate::{error::Result, models::Session};

/// Persistence collaborator for finished study sessions
pub trait SessionStore: Send + Sync {
    /// Insert a session, or replace it when `session.id` is set. Returns the row id.
    fn upsert_session(&self, session: &Session) -> Result<i64>;

    fn delete_session(&self, id: i64) -> Result<()>;

    /// Whether a session may still be recorded against this subject
    fn subject_exists(&self, subject_id: i64) -> Result<bool>;
}
