//! Storage-layer validation.
//!
//! Each resource declares a [`Schema`]: which struct field maps to which wire
//! path and database column, which constraint names belong to which path, and
//! whether a field is an ordinary attribute or the ownership reference. The
//! schema turns `validator` results and Postgres constraint violations into a
//! single [`ValidationFailure`] that the error normalizer understands.

use std::collections::HashMap;
use std::fmt;

use sqlx::error::DatabaseError;
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// How a failing field is presented to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// A regular, client-visible attribute.
    Attribute,
    /// The reference linking a record to the user that owns it.
    /// Failures on it are reported under the `"global"` key.
    Ownership,
}

/// One field of a resource schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaField {
    /// Rust struct field name, as reported by `validator`.
    pub name: &'static str,
    /// Wire path shown to clients.
    pub path: &'static str,
    /// Database column backing the field.
    pub column: &'static str,
    pub role: FieldRole,
}

/// A named database constraint and the message reported when it is violated.
#[derive(Debug, Clone, Copy)]
pub struct Constraint {
    pub name: &'static str,
    pub path: &'static str,
    pub message: &'static str,
}

/// Whether absent fields are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every field is checked, including `required` rules (create / replace).
    Full,
    /// Only supplied fields are checked (partial update).
    Partial,
}

#[derive(Debug)]
pub struct Schema {
    /// Resource name used in validation summaries, e.g. `Tasks`.
    pub resource: &'static str,
    pub table: &'static str,
    pub fields: &'static [SchemaField],
    pub constraints: &'static [Constraint],
}

/// A single field's value could not be converted to its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CastFailure {
    pub path: String,
    pub value: String,
    pub kind: &'static str,
    pub message: String,
}

impl CastFailure {
    pub fn new(kind: &'static str, value: impl Into<String>, path: impl Into<String>) -> Self {
        let value = value.into();
        let path = path.into();
        let message = format!(
            "Cast to {} failed for value \"{}\" at path \"{}\"",
            kind, value, path
        );
        Self {
            path,
            value,
            kind,
            message,
        }
    }
}

/// One failing field inside a [`ValidationFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub path: String,
    pub message: String,
    pub role: FieldRole,
}

/// One or more schema constraints failed for a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationFailure {
    pub resource: String,
    /// Failures in encounter order.
    pub failures: Vec<FieldFailure>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed", self.resource)?;
        for (index, failure) in self.failures.iter().enumerate() {
            let separator = if index == 0 { ": " } else { ", " };
            write!(f, "{}{}: {}", separator, failure.path, failure.message)?;
        }
        Ok(())
    }
}

impl ValidationFailure {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            failures: Vec::new(),
        }
    }

    /// Records a failure on an ordinary attribute.
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push_with_role(path, message, FieldRole::Attribute);
    }

    /// Records a failure on the ownership reference.
    pub fn push_ownership(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push_with_role(path, message, FieldRole::Ownership);
    }

    pub fn push_with_role(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        role: FieldRole,
    ) {
        self.failures.push(FieldFailure {
            path: path.into(),
            message: message.into(),
            role,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Schema {
    pub fn field_by_name(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.column == column)
    }

    pub fn role_of(&self, path: &str) -> FieldRole {
        self.fields
            .iter()
            .find(|field| field.path == path)
            .map(|field| field.role)
            .unwrap_or(FieldRole::Attribute)
    }

    /// Runs the `validator` rules of `value` and reports failures in schema
    /// declaration order, so the output does not depend on hash ordering.
    pub fn validate<T: Validate>(
        &self,
        value: &T,
        mode: ValidationMode,
    ) -> Result<(), ValidationFailure> {
        let errors = match value.validate() {
            Ok(()) => return Ok(()),
            Err(errors) => errors,
        };

        let mut by_field: HashMap<&str, &Vec<ValidationError>> =
            errors.field_errors().into_iter().collect();
        let mut failure = ValidationFailure::new(self.resource);

        for field in self.fields {
            if let Some(field_errors) = by_field.remove(field.name) {
                self.push_errors(&mut failure, field.path, field.role, field_errors, mode);
            }
        }

        // Fields the schema does not declare keep their struct name.
        let mut rest: Vec<_> = by_field.into_iter().collect();
        rest.sort_by_key(|(name, _)| *name);
        for (name, field_errors) in rest {
            self.push_errors(&mut failure, name, FieldRole::Attribute, field_errors, mode);
        }

        failure.into_result()
    }

    fn push_errors(
        &self,
        failure: &mut ValidationFailure,
        path: &str,
        role: FieldRole,
        errors: &[ValidationError],
        mode: ValidationMode,
    ) {
        for error in errors {
            if mode == ValidationMode::Partial && error.code == "required" {
                continue;
            }
            let message = error
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| format!("Path `{}` is invalid.", path));
            failure.push_with_role(path, message, role);
        }
    }

    /// Maps a Postgres constraint violation on this schema's table to a
    /// validation failure. Returns `None` for anything that is not a
    /// unique, not-null, or foreign-key violation this schema knows about.
    pub fn database_failure(&self, error: &PgDatabaseError) -> Option<ValidationFailure> {
        if error.table() != Some(self.table) {
            return None;
        }

        let (path, message) = match error.code() {
            // unique_violation | foreign_key_violation
            "23505" | "23503" => {
                let name = error.constraint()?;
                let constraint = self.constraints.iter().find(|c| c.name == name)?;
                (constraint.path, constraint.message.to_string())
            }
            // not_null_violation
            "23502" => {
                let field = self.field_by_column(error.column()?)?;
                (field.path, format!("Path `{}` is required.", field.path))
            }
            _ => return None,
        };

        let mut failure = ValidationFailure::new(self.resource);
        failure.push_with_role(path, message, self.role_of(path));
        Some(failure)
    }
}

/// Finds the schema owning the violated table and converts the violation.
pub fn classify_database_error(error: &dyn DatabaseError) -> Option<ValidationFailure> {
    let pg_error = error.try_downcast_ref::<PgDatabaseError>()?;
    [&super::task::TASK_SCHEMA, &super::user::USER_SCHEMA]
        .into_iter()
        .find_map(|schema| schema.database_failure(pg_error))
}
