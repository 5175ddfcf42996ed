pub mod schema;
pub mod task;
pub mod user;

pub use schema::{CastFailure, FieldRole, Schema, ValidationFailure, ValidationMode};
pub use task::{Task, TaskDraft, TASK_SCHEMA};
pub use user::{User, UserDraft, USER_SCHEMA};
