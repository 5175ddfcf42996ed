use crate::error::AppError;
use bcrypt::{hash, verify};

const HASH_COST: u32 = 10;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(hash(password, HASH_COST)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hashed_password: &str) -> bool {
    match verify(password, hashed_password) {
        Ok(matches) => matches,
        Err(e) => {
            log::warn!("password verification failed: {}", e);
            false
        }
    }
}
