use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::{string_field, Serializer};
use crate::error::AppError;
use crate::models::{User, UserDraft};
use crate::text::title_case;

const AVATAR_SIZE: u32 = 200;

/// A user as presented to clients, with the session token after login or
/// registration.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub token: Option<String>,
}

impl UserRecord {
    pub fn new(user: User) -> Self {
        Self { user, token: None }
    }

    pub fn with_token(user: User, token: String) -> Self {
        Self {
            user,
            token: Some(token),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UsersSerializer;

impl Serializer for UsersSerializer {
    type Record = UserRecord;
    type Input = UserDraft;

    /// Passwords are only read when `is_create` is set.
    fn serialize_input(&self, raw: &Value, is_create: bool) -> Result<UserDraft, AppError> {
        let password = if is_create {
            string_field(raw, "password")?
        } else {
            None
        };

        Ok(UserDraft {
            email: string_field(raw, "email")?.map(|email| email.trim().to_lowercase()),
            password,
            profile_name: string_field(raw, "profile.name")?,
            profile_gender: string_field(raw, "profile.gender")?
                .map(|gender| gender.to_lowercase()),
            profile_timezone: string_field(raw, "profile.timezone")?,
        })
    }

    fn serialize_output(&self, record: &UserRecord) -> Value {
        let user = &record.user;
        let mut output = Map::new();
        output.insert("id".into(), json!(user.id.to_string()));
        output.insert("email".into(), json!(user.email));
        output.insert("picture".into(), json!(gravatar(&user.email, AVATAR_SIZE)));
        output.insert("name".into(), json!(title_case(&user.profile_name)));
        output.insert("gender".into(), json!(title_case(&user.profile_gender)));
        output.insert("timezone".into(), json!(user.profile_timezone));
        if let Some(token) = &record.token {
            output.insert("token".into(), json!(token));
        }
        Value::Object(output)
    }
}

/// Gravatar URL for `email`, falling back to the generated avatar when empty.
pub fn gravatar(email: &str, size: u32) -> String {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return format!("https://gravatar.com/avatar/?s={}&d=retro", size);
    }
    let digest = Sha256::digest(email.as_bytes());
    format!("https://gravatar.com/avatar/{:x}?s={}&d=retro", digest, size)
}
