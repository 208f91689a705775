//! Project domain model.
//!
//! # Invariants
//! - `color` is always populated; an omitted or blank color falls back to
//!   [`DEFAULT_PROJECT_COLOR`] before the insert leaves the client.

use crate::model::is_untouched;
use crate::model::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;

/// Color assigned to projects created without an explicit one.
pub const DEFAULT_PROJECT_COLOR: &str = "#3498db";

/// Canonical project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: UserId,
}

/// Insert payload for a project. The owner id is attached by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: DEFAULT_PROJECT_COLOR.to_string(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the color, keeping the default for `None` or blank input.
    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = match color {
            Some(value) if !value.trim().is_empty() => value,
            _ => DEFAULT_PROJECT_COLOR.to_string(),
        };
        self
    }
}

/// Partial update for a project row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "is_untouched")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "is_untouched")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "is_untouched")]
    pub color: Option<String>,
}

impl ProjectPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}
