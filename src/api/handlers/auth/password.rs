//! Argon2id password hashing.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

const DUMMY_PASSWORD: &str = "scolaris-placeholder-password";

/// Hash a password into a PHC string.
pub(super) fn hash_password(password: &str, params: &Params) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Verify a password against a stored PHC string. Malformed hashes never match.
pub(super) fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

pub(super) fn dummy_hash(params: &Params) -> Result<String> {
    hash_password(DUMMY_PASSWORD, params)
}

#[cfg(test)]
pub(crate) fn test_params() -> Params {
    Params::new(8, 1, 1, None).unwrap_or_default()
}
