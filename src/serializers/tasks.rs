use chrono::Utc;
use serde_json::{json, Value};

use super::{date_field, string_field, string_list_field, Serializer};
use crate::error::AppError;
use crate::models::{Task, TaskDraft};
use crate::text::{relative_time, title_case};

/// Presents tasks to clients and reads task payloads.
///
/// Statuses and categories are stored lower-case and shown title-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct TasksSerializer;

impl Serializer for TasksSerializer {
    type Record = Task;
    type Input = TaskDraft;

    fn serialize_input(&self, raw: &Value, _is_create: bool) -> Result<TaskDraft, AppError> {
        Ok(TaskDraft {
            title: string_field(raw, "title")?,
            description: string_field(raw, "description")?,
            due: date_field(raw, "due")?,
            categories: string_list_field(raw, "categories")?.map(|categories| {
                categories
                    .into_iter()
                    .map(|category| category.to_lowercase())
                    .collect()
            }),
            status: string_field(raw, "status")?.map(|status| status.to_lowercase()),
            // Ownership is taken from the authenticated user, never the body.
            user_id: None,
        })
    }

    fn serialize_output(&self, task: &Task) -> Value {
        json!({
            "id": task.id.to_string(),
            "title": task.title,
            "description": task.description,
            "due": task.due,
            "dueDescription": relative_time(task.due, Utc::now()),
            "categories": task.categories.iter().map(|c| title_case(c)).collect::<Vec<_>>(),
            "status": title_case(&task.status),
            "createdAt": task.created_at,
            "updatedAt": task.updated_at,
        })
    }
}
