use actix_web::{delete, http::StatusCode, patch, post, put, web, HttpRequest, Responder};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::{generate_token, hash_password, incorrect_credentials, verify_password, AuthenticatedUser, LoginRequest},
    config::Config,
    error::AppError,
    models::{user::USER_COLUMNS, User, UserDraft, ValidationMode, USER_SCHEMA},
    response::{ApiVersion, Payload, ResponseBuilder},
    serializers::{Serializer, UserRecord, UsersSerializer},
};

/// Registers a user and returns it with a session token.
#[post("")]
pub async fn create_user(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    version: ApiVersion,
    body: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let draft = UsersSerializer.serialize_input(&body, true)?;
    USER_SCHEMA.validate(&draft, ValidationMode::Full)?;

    let password_hash = match &draft.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let sql = format!(
        "INSERT INTO users (id, email, password_hash, profile_name, profile_gender, profile_timezone) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(Uuid::new_v4())
        .bind(&draft.email)
        .bind(password_hash)
        .bind(&draft.profile_name)
        .bind(&draft.profile_gender)
        .bind(&draft.profile_timezone)
        .fetch_one(pool.get_ref())
        .await?;

    log::info!("user {} registered", user.id);
    let token = generate_token(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok(ResponseBuilder::new(version)
        .status(StatusCode::CREATED)
        .message("User Created Successfully")
        .serialize(Payload::One(UserRecord::with_token(user, token)), &UsersSerializer))
}

/// Exchanges an email and password for a session token.
#[post("/auth")]
pub async fn login(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    version: ApiVersion,
    credentials: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let (email, password) = credentials.credentials()?;

    let user = match User::find_by_email(&pool, &email).await? {
        Some(user) if verify_password(password, &user.password_hash) => user,
        _ => {
            log::warn!("failed login for {}", email);
            return Err(incorrect_credentials());
        }
    };

    let token = generate_token(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok(ResponseBuilder::new(version)
        .serialize(Payload::One(UserRecord::with_token(user, token)), &UsersSerializer))
}

/// Replaces the authenticated user's profile. The password is never changed here.
#[put("")]
pub async fn replace_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    body: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let mut draft = UsersSerializer.serialize_input(&body, false)?;
    draft.password = Some(user.password_hash.clone());
    USER_SCHEMA.validate(&draft, ValidationMode::Full)?;

    save_user(&pool, &req, version, &user, draft).await
}

/// Updates only the supplied profile fields.
#[patch("")]
pub async fn patch_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    body: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let draft = UsersSerializer.serialize_input(&body, false)?;
    USER_SCHEMA.validate(&draft, ValidationMode::Partial)?;

    save_user(&pool, &req, version, &user, draft.merge_into(&user)).await
}

/// Deletes the authenticated user together with their tasks.
#[delete("")]
pub async fn delete_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    version: ApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::entity_not_found("User does not exist", &req));
    }

    log::info!("user {} deleted", user.id);

    Ok(ResponseBuilder::new(version)
        .message("User Deleted Successfully.")
        .build(json!({})))
}

async fn save_user(
    pool: &PgPool,
    req: &HttpRequest,
    version: ApiVersion,
    user: &User,
    draft: UserDraft,
) -> Result<impl Responder, AppError> {
    let sql = format!(
        "UPDATE users SET email = $1, profile_name = $2, profile_gender = $3, \
         profile_timezone = $4, updated_at = NOW() WHERE id = $5 RETURNING {}",
        USER_COLUMNS
    );
    let updated = sqlx::query_as::<_, User>(&sql)
        .bind(&draft.email)
        .bind(&draft.profile_name)
        .bind(&draft.profile_gender)
        .bind(&draft.profile_timezone)
        .bind(user.id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::entity_not_found("User does not exist", req))?;

    Ok(ResponseBuilder::new(version)
        .message("User Updated Successfully")
        .serialize(Payload::One(UserRecord::new(updated)), &UsersSerializer))
}
