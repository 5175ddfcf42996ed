#![doc = "The `taskdesk` library crate."]
#![doc = ""]
#![doc = "Task and user management over a versioned REST API. Every response, success"]
#![doc = "or failure, shares one envelope shape; failures are normalized from a closed"]
#![doc = "error taxonomy and client filter/sort keys are whitelisted per resource."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod query;
pub mod response;
pub mod routes;
pub mod serializers;
pub mod text;

pub use crate::error::AppError;
pub use crate::normalize::{normalize, ErrorEnvelope};
pub use crate::response::{ApiVersion, Payload, ResponseBuilder, SuccessEnvelope};
