//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task row, including the embedded project snapshot.
//! - Define insert and partial-update payloads.
//!
//! # Invariants
//! - `user_id` always equals the acting user; the backend rejects anything else.
//! - `project` is a denormalized copy resolved at read time. It goes stale when
//!   the project is edited and is only refreshed by the next fetch.

use crate::model::is_untouched;
use crate::model::project::{Project, ProjectId};
use crate::model::user::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

/// Task urgency bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Stable wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Canonical task row as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: UserId,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Read-only snapshot of the linked project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
}

/// Insert payload for a task. New tasks always start incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub project_id: Option<ProjectId>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            completed: false,
            priority: Priority::default(),
            due_date: None,
            project_id: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }
}

/// Partial update for a task row.
///
/// `None` leaves a column untouched; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "is_untouched")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "is_untouched")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "is_untouched")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "is_untouched")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "is_untouched")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "is_untouched")]
    pub project_id: Option<Option<ProjectId>>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NewTask, Priority, Task, TaskPatch};
    use serde_json::json;

    #[test]
    fn decodes_row_with_embedded_project() {
        let task: Task = serde_json::from_value(json!({
            "id": "6f1c9f8e-0c1e-4d5e-8a53-2f7d4c1b9a01",
            "title": "Write report",
            "description": null,
            "completed": false,
            "priority": "high",
            "due_date": "2024-06-30",
            "created_at": "2024-06-01T08:00:00.000000Z",
            "updated_at": "2024-06-01T08:00:00.000000Z",
            "user_id": "0b0f8f44-52a1-4f4e-9d0c-8f1a2b6c7d10",
            "project_id": "9a7b5c3d-1e2f-4a6b-8c9d-0e1f2a3b4c5d",
            "project": {
                "id": "9a7b5c3d-1e2f-4a6b-8c9d-0e1f2a3b4c5d",
                "name": "Work",
                "description": null,
                "color": "#3498db",
                "created_at": "2024-05-01T08:00:00Z",
                "updated_at": "2024-05-01T08:00:00Z",
                "user_id": "0b0f8f44-52a1-4f4e-9d0c-8f1a2b6c7d10"
            }
        }))
        .expect("task row should decode");

        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date.map(|d| d.to_string()).as_deref(), Some("2024-06-30"));
        let project = task.project.expect("embedded project");
        assert_eq!(Some(project.id), task.project_id);
        assert_eq!(project.name, "Work");
    }

    #[test]
    fn decodes_row_without_embed() {
        let task: Task = serde_json::from_value(json!({
            "id": "6f1c9f8e-0c1e-4d5e-8a53-2f7d4c1b9a01",
            "title": "Inbox item",
            "completed": true,
            "priority": "low",
            "created_at": "2024-06-01T08:00:00Z",
            "updated_at": "2024-06-02T08:00:00Z",
            "user_id": "0b0f8f44-52a1-4f4e-9d0c-8f1a2b6c7d10"
        }))
        .expect("task row should decode");

        assert!(task.completed);
        assert!(task.project.is_none());
        assert!(task.project_id.is_none());
    }

    #[test]
    fn new_task_defaults_to_medium_and_incomplete() {
        let draft = NewTask::new("Buy milk");
        assert_eq!(draft.priority, Priority::Medium);
        assert!(!draft.completed);
    }

    #[test]
    fn patch_serializes_only_touched_fields() {
        let value = serde_json::to_value(TaskPatch::completed(true)).expect("patch should encode");
        assert_eq!(value, json!({ "completed": true }));

        let clear_due = TaskPatch {
            due_date: Some(None),
            priority: Some(Priority::Low),
            ..TaskPatch::default()
        };
        let value = serde_json::to_value(clear_due).expect("patch should encode");
        assert_eq!(value, json!({ "due_date": null, "priority": "low" }));
    }
}
