//! Success envelopes.
//!
//! Every successful response uses the same outer shape as an error response:
//! `{ VERSION, statusCode, message, data }`. `ResponseBuilder` assembles it,
//! either passing the payload through or presenting it with a [`Serializer`].

use futures::future::{ready, Ready};

use actix_web::{
    body::BoxBody, dev::Payload as RequestPayload, http::StatusCode, FromRequest, HttpRequest,
    HttpResponse, Responder,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::serializers::Serializer;

/// API version stamped on every envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ApiVersion {
    #[default]
    V1,
}

impl ApiVersion {
    /// Derives the version from the first path segment (`/v1/...`). Paths
    /// outside a versioned scope get the default.
    pub fn from_path(path: &str) -> Self {
        match path.trim_start_matches('/').split('/').next() {
            Some(segment) if segment.eq_ignore_ascii_case("v1") => ApiVersion::V1,
            _ => ApiVersion::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "V1",
        }
    }
}

impl FromRequest for ApiVersion {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut RequestPayload) -> Self::Future {
        ready(Ok(ApiVersion::from_path(req.path())))
    }
}

pub(crate) fn serialize_status<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

/// A result payload: one record or a sequence of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Payload<T> {
    /// Applies `f` to the single record, or to every record in order.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Payload<U> {
        match self {
            Payload::One(record) => Payload::One(f(record)),
            Payload::Many(records) => Payload::Many(records.into_iter().map(f).collect()),
        }
    }
}

impl<T> From<Vec<T>> for Payload<T> {
    fn from(records: Vec<T>) -> Self {
        Payload::Many(records)
    }
}

/// The envelope sent for every successful request.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope<D> {
    #[serde(rename = "VERSION")]
    pub version: ApiVersion,
    #[serde(rename = "statusCode", serialize_with = "serialize_status")]
    pub status_code: StatusCode,
    pub message: String,
    pub data: D,
}

impl<D: Serialize> SuccessEnvelope<D> {
    pub fn into_response(self) -> HttpResponse {
        HttpResponse::build(self.status_code).json(self)
    }
}

impl<D: Serialize> Responder for SuccessEnvelope<D> {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        self.into_response()
    }
}

/// Builds a [`SuccessEnvelope`]. Defaults to `200 OK` with the status's
/// reason phrase as the message.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    version: ApiVersion,
    status: StatusCode,
    message: Option<String>,
}

impl ResponseBuilder {
    pub fn new(version: ApiVersion) -> Self {
        Self {
            version,
            status: StatusCode::OK,
            message: None,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Wraps `data` unchanged.
    pub fn build<D: Serialize>(self, data: D) -> SuccessEnvelope<D> {
        let message = self.message.unwrap_or_else(|| {
            self.status
                .canonical_reason()
                .unwrap_or_default()
                .to_string()
        });

        SuccessEnvelope {
            version: self.version,
            status_code: self.status,
            message,
            data,
        }
    }

    /// Presents every record through `serializer`, keeping the payload's shape
    /// and order.
    pub fn serialize<S: Serializer>(
        self,
        payload: Payload<S::Record>,
        serializer: &S,
    ) -> SuccessEnvelope<Payload<Value>> {
        let data = payload.map(|record| serializer.serialize_output(&record));
        self.build(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializers::Serializer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Doubler;

    impl Serializer for Doubler {
        type Record = i64;
        type Input = i64;

        fn serialize_input(&self, raw: &Value, _is_create: bool) -> Result<i64, AppError> {
            raw.as_i64()
                .ok_or_else(|| AppError::unhandled("not a number"))
        }

        fn serialize_output(&self, record: &i64) -> Value {
            json!({ "value": record * 2 })
        }
    }

    #[test]
    fn test_sequence_is_serialized_in_order() {
        let envelope = ResponseBuilder::new(ApiVersion::V1)
            .serialize(Payload::Many(vec![3, 1, 2]), &Doubler);

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "VERSION": "V1",
                "statusCode": 200,
                "message": "OK",
                "data": [{ "value": 6 }, { "value": 2 }, { "value": 4 }]
            })
        );
    }

    #[test]
    fn test_single_record_is_serialized_once() {
        let envelope = ResponseBuilder::new(ApiVersion::V1)
            .status(StatusCode::CREATED)
            .message("Task Created Successfully")
            .serialize(Payload::One(21), &Doubler);

        assert_eq!(envelope.status_code, StatusCode::CREATED);
        assert_eq!(envelope.message, "Task Created Successfully");
        assert_eq!(envelope.data, Payload::One(json!({ "value": 42 })));
    }

    #[test]
    fn test_passthrough_without_serializer() {
        let envelope = ResponseBuilder::new(ApiVersion::V1)
            .message("Task Deleted Successfully.")
            .build(json!({}));

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "VERSION": "V1",
                "statusCode": 200,
                "message": "Task Deleted Successfully.",
                "data": {}
            })
        );
    }

    #[test]
    fn test_response_status_matches_envelope() {
        let response = ResponseBuilder::new(ApiVersion::V1)
            .status(StatusCode::CREATED)
            .build(json!({ "id": 1 }))
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_version_from_path() {
        assert_eq!(ApiVersion::from_path("/v1/tasks"), ApiVersion::V1);
        assert_eq!(ApiVersion::from_path("/healthcheck"), ApiVersion::V1);
        assert_eq!(ApiVersion::V1.as_str(), "V1");
    }
}
