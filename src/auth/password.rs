//! Argon2id password hashing. Hashes are PHC strings carrying their own salt
//! and parameters, so they can be verified without extra state.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::BudgetError;

pub fn hash_password(password: &str) -> Result<String, BudgetError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| BudgetError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, BudgetError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| BudgetError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
