//! The single boundary where failures become client-facing envelopes.
//!
//! [`normalize`] is total over [`AppError`]: it starts from the
//! `UnhandledException` envelope and overlays whatever the failure's variant
//! contributes. It logs the raw failure before returning.

use actix_web::{http::StatusCode, HttpResponse};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, ErrorName, FieldMessages};
use crate::models::schema::{FieldRole, ValidationFailure};
use crate::response::{serialize_status, ApiVersion};

/// Key ownership-field failures are reported under.
pub const GLOBAL_KEY: &str = "global";

/// The wire shape of every error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "VERSION")]
    pub version: ApiVersion,
    #[serde(rename = "statusCode", serialize_with = "serialize_status")]
    pub status_code: StatusCode,
    pub name: ErrorName,
    pub message: String,
    pub data: Value,
}

impl ErrorEnvelope {
    fn unhandled(version: ApiVersion) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            version,
            status_code: status,
            name: ErrorName::UnhandledException,
            message: status.canonical_reason().unwrap_or_default().to_string(),
            data: Value::Object(Map::new()),
        }
    }

    pub fn into_response(self) -> HttpResponse {
        HttpResponse::build(self.status_code).json(self)
    }
}

/// Converts any failure into exactly one envelope.
pub fn normalize(error: &AppError, version: ApiVersion) -> ErrorEnvelope {
    let mut envelope = ErrorEnvelope::unhandled(version);

    match error {
        AppError::Generic {
            message,
            status,
            data,
        } => {
            envelope.name = ErrorName::GenericException;
            envelope.status_code = *status;
            envelope.message = message.clone();
            if let Some(data) = data {
                envelope.data = data.clone();
            }
        }
        AppError::EntityNotFound { message, help } | AppError::RouteNotFound { message, help } => {
            envelope.name = error.name();
            envelope.status_code = error.status();
            envelope.message = message.clone();
            envelope.data = help_data(help);
        }
        AppError::QueryValidation(errors) => {
            envelope.name = ErrorName::QueryValidationError;
            envelope.status_code = error.status();
            envelope.message = error.to_string();
            envelope.data = field_messages_data(errors);
        }
        AppError::Unauthorized(data) => {
            envelope.name = ErrorName::UnauthorizedException;
            envelope.status_code = error.status();
            envelope.message = error.to_string();
            envelope.data = Value::Object(data.clone());
        }
        AppError::Cast(failure) => {
            let mut data = Map::new();
            data.insert(failure.path.clone(), Value::String(failure.message.clone()));

            envelope.name = ErrorName::CastError;
            envelope.status_code = StatusCode::BAD_REQUEST;
            envelope.message = failure.message.clone();
            envelope.data = Value::Object(data);
        }
        AppError::Validation(failure) => {
            envelope.name = ErrorName::ValidationError;
            envelope.status_code = StatusCode::BAD_REQUEST;
            envelope.message = failure.to_string();
            envelope.data = field_messages_data(&validation_messages(failure));
        }
        AppError::Unhandled(_) => {}
    }

    if envelope.status_code.is_server_error() {
        log::error!("{} ({}): {:?}", envelope.name.as_str(), envelope.status_code, error);
    } else {
        log::warn!("{} ({}): {}", envelope.name.as_str(), envelope.status_code, error);
    }

    envelope
}

/// Groups a validation failure's messages by client-facing key.
///
/// Leading `"Path "` is stripped from each message, ownership fields are
/// reported under `"global"`, and messages sharing a key are kept in
/// encounter order.
pub fn validation_messages(failure: &ValidationFailure) -> FieldMessages {
    let mut grouped = FieldMessages::new();

    for field in &failure.failures {
        let key = match field.role {
            FieldRole::Ownership => GLOBAL_KEY.to_string(),
            FieldRole::Attribute => field.path.clone(),
        };
        let message = field.message.trim();
        let message = message.strip_prefix("Path ").unwrap_or(message).trim();

        grouped.entry(key).or_default().push(message.to_string());
    }

    grouped
}

fn help_data(help: &str) -> Value {
    let mut data = Map::new();
    data.insert("help".to_string(), Value::String(help.to_string()));
    Value::Object(data)
}

fn field_messages_data(messages: &FieldMessages) -> Value {
    let data = messages
        .iter()
        .map(|(key, values)| {
            let values = values.iter().cloned().map(Value::String).collect();
            (key.clone(), Value::Array(values))
        })
        .collect();
    Value::Object(data)
}
