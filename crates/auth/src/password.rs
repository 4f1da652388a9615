//! Password hashing and verification using Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::AuthError;

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a password into a PHC-format string.
///
/// If `pepper` is provided it is prepended to the password; verification must
/// use the same pepper.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(input, &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(format!("hash error: {e}")))
}

/// Verify a plaintext password against a stored hash.
///
/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let parsed = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Hashing(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Hashing(format!("verify error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter2hunter2", None).unwrap();
        assert!(verify_password("hunter2hunter2", &hash, None).unwrap());
        assert!(!verify_password("wrong-password", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("hunter2hunter2", Some("pepper!")).unwrap();
        assert!(verify_password("hunter2hunter2", &hash, Some("pepper!")).unwrap());
        assert!(!verify_password("hunter2hunter2", &hash, None).unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash", None).is_err());
    }
}
