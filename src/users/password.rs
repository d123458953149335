use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use super::error::UserError;
use super::fields::{check_width, PASSWORD_MAX};

fn argon2id() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

fn hash_error(e: password_hash::Error) -> UserError {
    error!(error = %e, "argon2 failure");
    UserError::PasswordHash(e.to_string())
}

/// Hashes `plain` with Argon2id and a fresh salt, returning the PHC string
/// that goes into `users.password`.
pub fn hash_password(plain: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = argon2id()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(hash_error)?
        .to_string();
    check_width("password", &phc, PASSWORD_MAX)?;
    Ok(phc)
}

/// `Ok(false)` only for a password that does not match. A stored value that
/// is not a usable Argon2 hash is an error.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, UserError> {
    let parsed = PasswordHash::new(stored).map_err(hash_error)?;
    match argon2id().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(hash_error(e)),
    }
}
