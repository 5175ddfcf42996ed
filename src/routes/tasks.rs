use actix_web::{delete, get, http::StatusCode, patch, post, put, web, HttpRequest, Responder};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{task::TASK_COLUMNS, CastFailure, Task, TaskDraft, ValidationMode, TASK_SCHEMA},
    query::{parse_query, select_owned, validate_query, DEFAULT_TASK_SORT, TASKS_TABLE, TASK_WHITELIST},
    response::{ApiVersion, Payload, ResponseBuilder},
    serializers::{Serializer, TasksSerializer},
};

/// Lists the authenticated user's tasks.
///
/// Filter and sort keys come from the query string and must be whitelisted;
/// results are ordered by `due` then `createdAt` (both descending) unless the
/// client overrides those keys.
#[get("")]
pub async fn get_tasks(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let parsed = parse_query(req.query_string())?;
    validate_query(&parsed.clause, &TASK_WHITELIST)?;

    let sort = parsed.clause.sort.over_defaults(DEFAULT_TASK_SORT);
    let mut builder = select_owned(
        &TASKS_TABLE,
        user.id,
        &parsed.clause.filter,
        &sort,
        &parsed.paging,
    )?;
    let tasks = builder
        .build_query_as::<Task>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(ResponseBuilder::new(version).serialize(Payload::Many(tasks), &TasksSerializer))
}

/// Creates a task owned by the authenticated user.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    body: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let mut draft = TasksSerializer.serialize_input(&body, true)?.with_defaults();
    draft.user_id = Some(user.id);
    TASK_SCHEMA.validate(&draft, ValidationMode::Full)?;

    let sql = format!(
        "INSERT INTO tasks (id, title, description, due, categories, status, user_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
        TASK_COLUMNS
    );
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(Uuid::new_v4())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.due)
        .bind(&draft.categories)
        .bind(&draft.status)
        .bind(draft.user_id)
        .fetch_one(pool.get_ref())
        .await?;

    log::info!("task {} created for user {}", task.id, user.id);

    Ok(ResponseBuilder::new(version)
        .status(StatusCode::CREATED)
        .message("Task Created Successfully")
        .serialize(Payload::One(task), &TasksSerializer))
}

#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    task_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let task = find_task(&pool, &req, &task_id, user.id).await?;
    Ok(ResponseBuilder::new(version).serialize(Payload::One(task), &TasksSerializer))
}

/// Replaces every field of a task. Omitted required fields are reported.
#[put("/{id}")]
pub async fn replace_task(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    task_id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let task = find_task(&pool, &req, &task_id, user.id).await?;

    let mut draft = TasksSerializer.serialize_input(&body, false)?;
    draft.user_id = Some(task.user_id);
    if draft.categories.is_none() {
        draft.categories = Some(Vec::new());
    }
    TASK_SCHEMA.validate(&draft, ValidationMode::Full)?;

    save_task(&pool, &req, version, &task, draft).await
}

/// Updates only the supplied fields of a task.
#[patch("/{id}")]
pub async fn patch_task(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    task_id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let task = find_task(&pool, &req, &task_id, user.id).await?;

    let draft = TasksSerializer.serialize_input(&body, false)?;
    TASK_SCHEMA.validate(&draft, ValidationMode::Partial)?;

    save_task(&pool, &req, version, &task, draft.merge_into(&task)).await
}

#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    task_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let task = find_task(&pool, &req, &task_id, user.id).await?;

    sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(task.id)
        .bind(task.user_id)
        .execute(pool.get_ref())
        .await?;

    Ok(ResponseBuilder::new(version)
        .message("Task Deleted Successfully.")
        .build(json!({})))
}

/// Parses a task id from the path.
pub fn parse_task_id(raw: &str) -> Result<Uuid, CastFailure> {
    Uuid::parse_str(raw).map_err(|_| CastFailure::new("UUID", raw, "id"))
}

/// Loads a task owned by `owner`; tasks of other users do not exist for them.
async fn find_task(
    pool: &PgPool,
    req: &HttpRequest,
    raw_id: &str,
    owner: Uuid,
) -> Result<Task, AppError> {
    let id = parse_task_id(raw_id)?;
    let sql = format!(
        "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
        TASK_COLUMNS
    );

    sqlx::query_as::<_, Task>(&sql)
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::entity_not_found("Task does not exist", req))
}

async fn save_task(
    pool: &PgPool,
    req: &HttpRequest,
    version: ApiVersion,
    task: &Task,
    draft: TaskDraft,
) -> Result<impl Responder, AppError> {
    let sql = format!(
        "UPDATE tasks SET title = $1, description = $2, due = $3, categories = $4, status = $5, \
         updated_at = NOW() WHERE id = $6 AND user_id = $7 RETURNING {}",
        TASK_COLUMNS
    );
    let updated = sqlx::query_as::<_, Task>(&sql)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.due)
        .bind(&draft.categories)
        .bind(&draft.status)
        .bind(task.id)
        .bind(task.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::entity_not_found("Task does not exist", req))?;

    Ok(ResponseBuilder::new(version)
        .message("Task Updated Successfully")
        .serialize(Payload::One(updated), &TasksSerializer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).unwrap(), id);

        let failure = parse_task_id("42").unwrap_err();
        assert_eq!(failure.path, "id");
        assert_eq!(
            failure.message,
            "Cast to UUID failed for value \"42\" at path \"id\""
        );
    }
}
