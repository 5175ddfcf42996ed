use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::schema::{Constraint, FieldRole, Schema, SchemaField};

lazy_static! {
    // IANA zone names such as `Europe/Paris` or `America/Argentina/Buenos_Aires`, plus `UTC`.
    static ref TIMEZONE_REGEX: Regex =
        Regex::new(r"^(UTC|GMT|[A-Z][A-Za-z_]+(/[A-Za-z0-9_+\-]+){1,2})$").unwrap();
}

/// Columns selected whenever a full user row is read back.
pub const USER_COLUMNS: &str = "id, email, password_hash, profile_name, profile_gender, profile_timezone, created_at, updated_at";

pub static USER_SCHEMA: Schema = Schema {
    resource: "Users",
    table: "users",
    fields: &[
        SchemaField {
            name: "email",
            path: "email",
            column: "email",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "password",
            path: "password",
            column: "password_hash",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "profile_name",
            path: "profile.name",
            column: "profile_name",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "profile_gender",
            path: "profile.gender",
            column: "profile_gender",
            role: FieldRole::Attribute,
        },
        SchemaField {
            name: "profile_timezone",
            path: "profile.timezone",
            column: "profile_timezone",
            role: FieldRole::Attribute,
        },
    ],
    constraints: &[Constraint {
        name: "users_email_key",
        path: "email",
        message: "Path `email` must be unique.",
    }],
};

/// A user row as stored in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub profile_name: String,
    pub profile_gender: String,
    pub profile_timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}

/// Client-supplied user fields after casting, before schema validation.
/// The password is plain text here and only present when registering.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct UserDraft {
    #[validate(
        required(message = "Path `email` is required."),
        email(message = "Path `email` is invalid.")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "Path `password` is required."),
        length(min = 1, message = "Path `password` is required.")
    )]
    pub password: Option<String>,

    #[validate(
        required(message = "Path `profile.name` is required."),
        length(min = 1, message = "Path `profile.name` is required.")
    )]
    pub profile_name: Option<String>,

    #[validate(
        required(message = "Path `profile.gender` is required."),
        length(min = 1, message = "Path `profile.gender` is required.")
    )]
    pub profile_gender: Option<String>,

    #[validate(
        required(message = "Path `profile.timezone` is required."),
        custom = "validate_timezone"
    )]
    pub profile_timezone: Option<String>,
}

fn validate_timezone(timezone: &str) -> Result<(), ValidationError> {
    if TIMEZONE_REGEX.is_match(timezone) {
        return Ok(());
    }
    let mut error = ValidationError::new("timezone");
    error.message = Some("Path `profile.timezone` is invalid.".into());
    Err(error)
}

impl UserDraft {
    /// Overlays the supplied profile fields on an existing user. The stored
    /// hash stands in for the password, so updates never need one and never
    /// change it.
    pub fn merge_into(self, user: &User) -> UserDraft {
        UserDraft {
            email: self.email.or_else(|| Some(user.email.clone())),
            password: Some(user.password_hash.clone()),
            profile_name: self.profile_name.or_else(|| Some(user.profile_name.clone())),
            profile_gender: self
                .profile_gender
                .or_else(|| Some(user.profile_gender.clone())),
            profile_timezone: self
                .profile_timezone
                .or_else(|| Some(user.profile_timezone.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::ValidationMode;

    fn complete_draft() -> UserDraft {
        UserDraft {
            email: Some("jane@example.com".into()),
            password: Some("password123".into()),
            profile_name: Some("jane doe".into()),
            profile_gender: Some("female".into()),
            profile_timezone: Some("Europe/Paris".into()),
        }
    }

    #[test]
    fn test_user_draft_validation() {
        assert!(USER_SCHEMA
            .validate(&complete_draft(), ValidationMode::Full)
            .is_ok());

        let invalid = UserDraft {
            email: Some("invalid-email".into()),
            profile_timezone: Some("Mars/Olympus Mons".into()),
            ..complete_draft()
        };
        let failure = USER_SCHEMA
            .validate(&invalid, ValidationMode::Full)
            .unwrap_err();
        let paths: Vec<_> = failure.failures.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["email", "profile.timezone"]);
        assert_eq!(failure.failures[0].message, "Path `email` is invalid.");
    }

    #[test]
    fn test_timezone_shapes() {
        assert!(validate_timezone("UTC").is_ok());
        assert!(validate_timezone("America/Argentina/Buenos_Aires").is_ok());
        assert!(validate_timezone("Etc/GMT+3").is_ok());
        assert!(validate_timezone("nowhere").is_err());
    }

    #[test]
    fn test_missing_password_reported_with_profile_paths() {
        let draft = UserDraft {
            password: None,
            profile_name: None,
            ..complete_draft()
        };
        let failure = USER_SCHEMA
            .validate(&draft, ValidationMode::Full)
            .unwrap_err();
        let paths: Vec<_> = failure.failures.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["password", "profile.name"]);
    }

    #[test]
    fn test_merge_keeps_stored_fields() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "jane@example.com".into(),
            password_hash: "$2b$10$hash".into(),
            profile_name: "jane".into(),
            profile_gender: "female".into(),
            profile_timezone: "Europe/Paris".into(),
            created_at: now,
            updated_at: now,
        };
        let merged = UserDraft {
            profile_name: Some("janet".into()),
            password: Some("ignored".into()),
            ..UserDraft::default()
        }
        .merge_into(&user);

        assert_eq!(merged.profile_name.as_deref(), Some("janet"));
        assert_eq!(merged.email.as_deref(), Some("jane@example.com"));
        assert_eq!(merged.password.as_deref(), Some("$2b$10$hash"));
        assert!(USER_SCHEMA.validate(&merged, ValidationMode::Full).is_ok());
    }
}
