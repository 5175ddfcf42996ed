use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::schema::{Constraint, FieldRole, Schema, SchemaField};

/// Statuses a task may be in, stored lower-case.
pub const TASK_STATUSES: &[&str] = &["pending", "in progress", "done"];

/// Status given to new tasks that do not specify one.
pub const DEFAULT_STATUS: &str = "pending";

/// Columns selected whenever a full task row is read back.
pub const TASK_COLUMNS: &str =
    "id, title, description, due, categories, status, user_id, created_at, updated_at";

pub static TASK_SCHEMA: Schema = Schema {
    resource: "Tasks",
    table: "tasks",
    fields: &[
        SchemaField {
            name: "title",
            path: "title",
            column: "title",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "description",
            path: "description",
            column: "description",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "due",
            path: "due",
            column: "due",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "categories",
            path: "categories",
            column: "categories",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "status",
            path: "status",
            column: "status",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "user_id",
            path: "userId",
            column: "user_id",
            role: FieldRole::Ownership,
        },
    ],
    constraints: &[Constraint {
        name: "tasks_user_id_fkey",
        path: "userId",
        message: "User does not exist",
    }],
};

/// A task row as stored in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub due: DateTime<Utc>,
    pub categories: Vec<String>,
    pub status: String,
    /// Owner of the task.
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied task fields after casting, before schema validation.
///
/// Every field is optional so the same type serves create, replace, and
/// partial update; which absences are errors is decided by the validation mode.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct TaskDraft {
    #[validate(
        required(message = "Path `title` is required."),
        length(min = 1, message = "Path `title` is required.")
    )]
    pub title: Option<String>,

    #[validate(
        required(message = "Path `description` is required."),
        length(min = 1, message = "Path `description` is required.")
    )]
    pub description: Option<String>,

    #[validate(required(message = "Path `due` is required."))]
    pub due: Option<DateTime<Utc>>,

    pub categories: Option<Vec<String>>,

    #[validate(
        required(message = "Path `status` is required."),
        custom = "validate_status"
    )]
    pub status: Option<String>,

    #[validate(required(message = "Path `userId` is required."))]
    pub user_id: Option<Uuid>,
}

fn validate_status(status: &str) -> Result<(), ValidationError> {
    if TASK_STATUSES.contains(&status) {
        return Ok(());
    }
    let mut error = ValidationError::new("enum");
    error.message = Some("Path `status` is invalid.".into());
    Err(error)
}

impl TaskDraft {
    /// Fills in schema defaults for a new task.
    pub fn with_defaults(mut self) -> Self {
        if self.status.is_none() {
            self.status = Some(DEFAULT_STATUS.to_string());
        }
        if self.categories.is_none() {
            self.categories = Some(Vec::new());
        }
        self
    }

    /// Overlays the supplied fields on an existing task.
    pub fn merge_into(self, task: &Task) -> TaskDraft {
        TaskDraft {
            title: self.title.or_else(|| Some(task.title.clone())),
            description: self.description.or_else(|| Some(task.description.clone())),
            due: self.due.or(Some(task.due)),
            categories: self.categories.or_else(|| Some(task.categories.clone())),
            status: self.status.or_else(|| Some(task.status.clone())),
            user_id: self.user_id.or(Some(task.user_id)),
        }
    }
}
