//! Domain records persisted by the store

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// A study subject with an hourly goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub goal_hours: f32,
    /// Card gradient as ARGB values
    #[serde(default)]
    pub colors: Vec<u32>,
}

impl Subject {
    pub fn validate(&self) -> Result<()> {
        let len = self.name.trim().chars().count();
        if len < 2 {
            return Err(StudyError::validation("name", "subject name is too short"));
        }
        if len > 20 {
            return Err(StudyError::validation("name", "subject name is too long"));
        }
        if !(1.0..=1000.0).contains(&self.goal_hours) {
            return Err(StudyError::validation(
                "goal_hours",
                "goal hours must be between 1 and 1000",
            ));
        }
        Ok(())
    }
}

/// Task priority, stored as its integer level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn level(self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    pub fn from_level(level: i64) -> Self {
        match level {
            2 => Priority::High,
            1 => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// A to-do item tied to a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<i64>,
    pub subject_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date_millis: i64,
    #[serde(default)]
    pub priority: Priority,
    /// Subject name captured when the task was saved
    #[serde(default)]
    pub related_to_subject: String,
    #[serde(default)]
    pub is_complete: bool,
}

impl Task {
    pub fn validate(&self) -> Result<()> {
        let len = self.title.trim().chars().count();
        if len < 4 {
            return Err(StudyError::validation("title", "task title is too short"));
        }
        if len > 30 {
            return Err(StudyError::validation("title", "task title is too long"));
        }
        Ok(())
    }
}

/// A finished study session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub id: Option<i64>,
    pub subject_id: i64,
    pub related_subject_name: String,
    pub duration_secs: u64,
    pub timestamp_millis: i64,
}
