//!
//! # Error Taxonomy
//!
//! This module defines `AppError`, the closed set of failures any request can end
//! in. Handlers return `Result<_, AppError>` and use `?`; foreign errors enter
//! through the `From` adapters at the bottom of this file, so nothing outside the
//! taxonomy ever reaches a client.
//!
//! `AppError` implements `actix_web::error::ResponseError` by handing itself to
//! [`crate::normalize::normalize`], which produces the single JSON envelope
//! shape shared by every error response.

use std::collections::BTreeMap;

use actix_web::{error::ResponseError, http::StatusCode, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::schema::{classify_database_error, CastFailure, ValidationFailure};
use crate::normalize::normalize;
use crate::response::ApiVersion;

/// Field (or `"global"`) to the ordered messages reported for it.
pub type FieldMessages = BTreeMap<String, Vec<String>>;

/// The closed set of error names a client can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorName {
    GenericException,
    EntityNotFoundException,
    RouteNotFoundException,
    QueryValidationError,
    UnauthorizedException,
    CastError,
    ValidationError,
    UnhandledException,
}

impl ErrorName {
    pub const ALL: [ErrorName; 8] = [
        ErrorName::GenericException,
        ErrorName::EntityNotFoundException,
        ErrorName::RouteNotFoundException,
        ErrorName::QueryValidationError,
        ErrorName::UnauthorizedException,
        ErrorName::CastError,
        ErrorName::ValidationError,
        ErrorName::UnhandledException,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorName::GenericException => "GenericException",
            ErrorName::EntityNotFoundException => "EntityNotFoundException",
            ErrorName::RouteNotFoundException => "RouteNotFoundException",
            ErrorName::QueryValidationError => "QueryValidationError",
            ErrorName::UnauthorizedException => "UnauthorizedException",
            ErrorName::CastError => "CastError",
            ErrorName::ValidationError => "ValidationError",
            ErrorName::UnhandledException => "UnhandledException",
        }
    }

    /// The status every error of this name is sent with. `GenericException`
    /// carries its own status; this is its default.
    pub fn default_status(&self) -> StatusCode {
        match self {
            ErrorName::GenericException | ErrorName::UnhandledException => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorName::EntityNotFoundException | ErrorName::RouteNotFoundException => {
                StatusCode::NOT_FOUND
            }
            ErrorName::QueryValidationError
            | ErrorName::CastError
            | ErrorName::ValidationError => StatusCode::BAD_REQUEST,
            ErrorName::UnauthorizedException => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Represents all possible failures of a request.
///
/// Each variant carries the payload its envelope needs; statuses are fixed per
/// variant except for `Generic`.
#[derive(Debug, Error)]
pub enum AppError {
    /// An explicit domain failure not covered by a more specific variant.
    #[error("{message}")]
    Generic {
        message: String,
        status: StatusCode,
        data: Option<Value>,
    },

    /// A lookup by identifier returned nothing (HTTP 404).
    #[error("{message}")]
    EntityNotFound { message: String, help: String },

    /// No handler matched the request path (HTTP 404).
    #[error("{message}")]
    RouteNotFound { message: String, help: String },

    /// One or more filter/sort keys failed the whitelist check (HTTP 400).
    #[error("Invalid Query supplied.")]
    QueryValidation(FieldMessages),

    /// Credential or token verification failed (HTTP 401).
    #[error("Error decoding token")]
    Unauthorized(Map<String, Value>),

    /// A supplied value could not be converted to its declared type (HTTP 400).
    #[error(transparent)]
    Cast(#[from] CastFailure),

    /// One or more schema constraints failed (HTTP 400).
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Anything else. The detail is logged, never sent (HTTP 500).
    #[error("unhandled failure: {0}")]
    Unhandled(String),
}

impl AppError {
    /// A `GenericException` with the default 500 status and no data.
    pub fn generic(message: impl Into<String>) -> Self {
        AppError::Generic {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            data: None,
        }
    }

    /// A `GenericException` with an explicit status and data.
    pub fn generic_with(message: impl Into<String>, status: StatusCode, data: Value) -> Self {
        AppError::Generic {
            message: message.into(),
            status,
            data: Some(data),
        }
    }

    /// `"<message>: <url>"` with the request method as help text.
    pub fn entity_not_found(message: impl AsRef<str>, req: &HttpRequest) -> Self {
        AppError::EntityNotFound {
            message: format!("{}: {}", message.as_ref(), req.uri()),
            help: format!("Method: {}", req.method()),
        }
    }

    pub fn route_not_found(req: &HttpRequest) -> Self {
        AppError::RouteNotFound {
            message: format!("route {} does not exist on this server", req.uri()),
            help: format!("Method: {}", req.method()),
        }
    }

    pub fn query_validation(errors: FieldMessages) -> Self {
        AppError::QueryValidation(errors)
    }

    /// A `QueryValidationError` for a single key.
    pub fn invalid_query_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldMessages::new();
        errors.insert(key.into(), vec![message.into()]);
        AppError::QueryValidation(errors)
    }

    /// An `UnauthorizedException` shaped `{ "global": message }`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("global".to_string(), Value::String(message.into()));
        AppError::Unauthorized(data)
    }

    pub fn unhandled(detail: impl Into<String>) -> Self {
        AppError::Unhandled(detail.into())
    }

    pub fn name(&self) -> ErrorName {
        match self {
            AppError::Generic { .. } => ErrorName::GenericException,
            AppError::EntityNotFound { .. } => ErrorName::EntityNotFoundException,
            AppError::RouteNotFound { .. } => ErrorName::RouteNotFoundException,
            AppError::QueryValidation(_) => ErrorName::QueryValidationError,
            AppError::Unauthorized(_) => ErrorName::UnauthorizedException,
            AppError::Cast(_) => ErrorName::CastError,
            AppError::Validation(_) => ErrorName::ValidationError,
            AppError::Unhandled(_) => ErrorName::UnhandledException,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Generic { status, .. } => *status,
            other => other.name().default_status(),
        }
    }
}

/// Converts `AppError` into the normalized JSON envelope.
///
/// Every route is mounted under `/v1`, so errors leaving through Actix's
/// `ResponseError` path are stamped with the default API version.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        normalize(self, ApiVersion::default()).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// Constraint violations a resource schema knows about become
/// `ValidationError`s; every other database error is unhandled.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(db_error) = &error {
            if let Some(failure) = classify_database_error(&**db_error) {
                return AppError::Validation(failure);
            }
        }
        AppError::Unhandled(error.to_string())
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::Unauthorized`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        match error.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::unauthorized("token expired.")
            }
            _ => AppError::unauthorized("Unable to verify token."),
        }
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::Unhandled`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Unhandled(format!("password hashing failed: {}", error))
    }
}
