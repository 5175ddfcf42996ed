use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Represents the claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The user the token was issued to.
    pub sub: Uuid,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

/// Signs a token for `user_id` that expires after `ttl`.
pub fn generate_token(user_id: Uuid, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::generic("Token Generation failed"))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        log::error!("failed to sign token: {}", e);
        AppError::generic("Token Generation failed")
    })
}

/// Verifies the signature and expiry of `token` and returns its claims.
///
/// Expired tokens and tokens that cannot be verified become distinct
/// `UnauthorizedException`s.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
