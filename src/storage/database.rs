//! SQLite-backed storage
//!
//! One connection guarded by a mutex. Tables are created on open if missing.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::SessionStore;
use crate::{
    error::{Result, StudyError},
    models::{Priority, Session, Subject, Task},
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS subjects (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        goal_hours  REAL NOT NULL,
        colors      TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS tasks (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id          INTEGER NOT NULL,
        title               TEXT NOT NULL,
        description         TEXT NOT NULL DEFAULT '',
        due_date_millis     INTEGER NOT NULL,
        priority            INTEGER NOT NULL DEFAULT 0,
        related_to_subject  TEXT NOT NULL DEFAULT '',
        is_complete         INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id                    INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id            INTEGER NOT NULL,
        related_subject_name  TEXT NOT NULL,
        duration_secs         INTEGER NOT NULL,
        timestamp_millis      INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_subject ON tasks(subject_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_timestamp ON sessions(timestamp_millis);
";

const TASK_COLUMNS: &str = "id, subject_id, title, description, due_date_millis, priority, related_to_subject, is_complete";
const SESSION_COLUMNS: &str = "id, subject_id, related_subject_name, duration_secs, timestamp_millis";

/// SQLite database holding subjects, tasks and sessions
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StudyError::LockPoisoned)
    }

    // ── Subjects ─────────────────────────────────────────────────────

    pub fn upsert_subject(&self, subject: &Subject) -> Result<i64> {
        let colors = serde_json::to_string(&subject.colors)
            .map_err(|e| StudyError::validation("colors", e.to_string()))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO subjects (id, name, goal_hours, colors) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                goal_hours = excluded.goal_hours,
                colors = excluded.colors",
            params![subject.id, subject.name.trim(), subject.goal_hours, colors],
        )?;
        let id = subject.id.unwrap_or_else(|| conn.last_insert_rowid());
        debug!("Upserted subject {}", id);
        Ok(id)
    }

    pub fn get_subject(&self, id: i64) -> Result<Subject> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, goal_hours, colors FROM subjects WHERE id = ?1",
            params![id],
            subject_from_row,
        )
        .optional()?
        .ok_or(StudyError::NotFound {
            entity: "Subject",
            id,
        })
    }

    pub fn list_subjects(&self) -> Result<Vec<Subject>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, goal_hours, colors FROM subjects ORDER BY id")?;
        let rows = stmt.query_map([], subject_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a subject together with its tasks and sessions
    pub fn delete_subject(&self, id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM subjects WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StudyError::NotFound {
                entity: "Subject",
                id,
            });
        }
        let tasks = tx.execute("DELETE FROM tasks WHERE subject_id = ?1", params![id])?;
        let sessions = tx.execute("DELETE FROM sessions WHERE subject_id = ?1", params![id])?;
        tx.commit()?;
        info!(
            "Deleted subject {} with {} tasks and {} sessions",
            id, tasks, sessions
        );
        Ok(())
    }

    pub fn subject_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))?)
    }

    pub fn total_goal_hours(&self) -> Result<f32> {
        let conn = self.conn()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(goal_hours), 0.0) FROM subjects",
            [],
            |row| row.get(0),
        )?;
        Ok(total as f32)
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn upsert_task(&self, task: &Task) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (id, subject_id, title, description, due_date_millis, priority, related_to_subject, is_complete)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                title = excluded.title,
                description = excluded.description,
                due_date_millis = excluded.due_date_millis,
                priority = excluded.priority,
                related_to_subject = excluded.related_to_subject,
                is_complete = excluded.is_complete",
            params![
                task.id,
                task.subject_id,
                task.title.trim(),
                task.description,
                task.due_date_millis,
                task.priority.level(),
                task.related_to_subject,
                task.is_complete,
            ],
        )?;
        let id = task.id.unwrap_or_else(|| conn.last_insert_rowid());
        debug!("Upserted task {}", id);
        Ok(id)
    }

    pub fn get_task(&self, id: i64) -> Result<Task> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            task_from_row,
        )
        .optional()?
        .ok_or(StudyError::NotFound { entity: "Task", id })
    }

    pub fn delete_task(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        if conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])? == 0 {
            return Err(StudyError::NotFound { entity: "Task", id });
        }
        Ok(())
    }

    /// Flip a task's completion flag and return the updated task
    pub fn toggle_task(&self, id: i64) -> Result<Task> {
        let mut task = self.get_task(id)?;
        task.is_complete = !task.is_complete;
        self.upsert_task(&task)?;
        Ok(task)
    }

    /// All incomplete tasks, soonest due first
    pub fn upcoming_tasks(&self) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE is_complete = 0
                 ORDER BY due_date_millis ASC, priority DESC"
            ),
            params![],
        )
    }

    pub fn upcoming_tasks_for_subject(&self, subject_id: i64) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE subject_id = ?1 AND is_complete = 0
                 ORDER BY due_date_millis ASC, priority DESC"
            ),
            params![subject_id],
        )
    }

    pub fn completed_tasks_for_subject(&self, subject_id: i64) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE subject_id = ?1 AND is_complete = 1
                 ORDER BY due_date_millis ASC, priority DESC"
            ),
            params![subject_id],
        )
    }

    fn query_tasks(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, task_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Most recent sessions across all subjects, newest first
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<Session>> {
        self.query_sessions(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 ORDER BY timestamp_millis DESC, id DESC LIMIT ?1"
            ),
            params![limit],
        )
    }

    pub fn recent_sessions_for_subject(&self, subject_id: i64, limit: u32) -> Result<Vec<Session>> {
        self.query_sessions(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE subject_id = ?1
                 ORDER BY timestamp_millis DESC, id DESC LIMIT ?2"
            ),
            params![subject_id, limit],
        )
    }

    /// Sum of all session durations in seconds
    pub fn total_session_duration(&self) -> Result<u64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COALESCE(SUM(duration_secs), 0) FROM sessions",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn total_session_duration_for_subject(&self, subject_id: i64) -> Result<u64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COALESCE(SUM(duration_secs), 0) FROM sessions WHERE subject_id = ?1",
            params![subject_id],
            |row| row.get(0),
        )?)
    }

    fn query_sessions(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, session_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl SessionStore for Database {
    fn upsert_session(&self, session: &Session) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (id, subject_id, related_subject_name, duration_secs, timestamp_millis)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                related_subject_name = excluded.related_subject_name,
                duration_secs = excluded.duration_secs,
                timestamp_millis = excluded.timestamp_millis",
            params![
                session.id,
                session.subject_id,
                session.related_subject_name,
                session.duration_secs,
                session.timestamp_millis,
            ],
        )?;
        let id = session.id.unwrap_or_else(|| conn.last_insert_rowid());
        debug!("Upserted session {} ({}s)", id, session.duration_secs);
        Ok(id)
    }

    fn delete_session(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        if conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])? == 0 {
            return Err(StudyError::NotFound {
                entity: "Session",
                id,
            });
        }
        Ok(())
    }

    fn subject_exists(&self, subject_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE id = ?1)",
            params![subject_id],
            |row| row.get(0),
        )?)
    }
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    let colors: String = row.get(3)?;
    let goal_hours: f64 = row.get(2)?;
    Ok(Subject {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        goal_hours: goal_hours as f32,
        colors: serde_json::from_str(&colors).unwrap_or_default(),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: Some(row.get(0)?),
        subject_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date_millis: row.get(4)?,
        priority: Priority::from_level(row.get(5)?),
        related_to_subject: row.get(6)?,
        is_complete: row.get(7)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: Some(row.get(0)?),
        subject_id: row.get(1)?,
        related_subject_name: row.get(2)?,
        duration_secs: row.get(3)?,
        timestamp_millis: row.get(4)?,
    })
}
