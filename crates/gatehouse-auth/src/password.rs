//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::AuthError;

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a password into an Argon2id PHC string.
///
/// If `pepper` is provided it is prepended to the password; the same
/// pepper must be passed to [`verify_password`].
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(input, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}
