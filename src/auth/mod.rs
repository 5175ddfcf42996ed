pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use actix_web::http::{header, header::HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::AppError;

pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{generate_token, verify_token, Claims};

const LOGIN_FAILED: &str = "User authentication failed.";

/// Represents the payload for a login request.
///
/// Both fields are optional so that missing values are reported alongside
/// malformed ones instead of rejecting the body outright.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Checks the credentials are present and well-formed, returning the
    /// lower-cased email and the password.
    pub fn credentials(&self) -> Result<(String, &str), AppError> {
        let mut errors = Map::new();

        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| validator::validate_email(*email));
        if email.is_none() {
            errors.insert("email".into(), json!(["`email` is invalid."]));
        }

        let password = self.password.as_deref().filter(|password| !password.is_empty());
        if password.is_none() {
            errors.insert("password".into(), json!(["`password` is invalid."]));
        }

        match (email, password) {
            (Some(email), Some(password)) => Ok((email.to_lowercase(), password)),
            _ => Err(login_failed(Value::Object(errors))),
        }
    }
}

/// The failure for credentials that do not match a user.
pub fn incorrect_credentials() -> AppError {
    login_failed(json!({ "global": ["`email`/`password` is incorrect."] }))
}

fn login_failed(data: Value) -> AppError {
    AppError::generic_with(LOGIN_FAILED, StatusCode::BAD_REQUEST, data)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::unauthorized("You must send an Authorization header with `Bearer <token>`.")
        })?;

    let mut parts = authorization.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        (Some(scheme), None) if scheme.eq_ignore_ascii_case("bearer") => {
            Err(AppError::unauthorized("Unable to verify token."))
        }
        _ => Err(AppError::unauthorized(
            "Authorization header must follow format `Bearer <token>`",
        )),
    }
}

/// Verifies the request's bearer token.
pub fn authorize(headers: &HeaderMap, secret: &str) -> Result<Claims, AppError> {
    let token = bearer_token(headers)?;
    verify_token(token, secret)
}
