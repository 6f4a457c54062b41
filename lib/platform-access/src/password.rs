//! One-way password hashing.
//!
//! Digests are Argon2id PHC strings with a random 16-byte salt. Accounts
//! created through OAuth have no digest at all; verification against a
//! missing digest is always `false` and does no hashing work.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;

use crate::error::PasswordError;

fn salt() -> Result<SaltString, PasswordError> {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    SaltString::encode_b64(&bytes).map_err(|e| PasswordError {
        reason: e.to_string(),
    })
}

/// Hashes `password` with a fresh salt.
///
/// # Errors
///
/// Returns an error if the hasher rejects its parameters.
pub fn hash(password: &str) -> Result<String, PasswordError> {
    let salt = salt()?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|e| PasswordError {
            reason: e.to_string(),
        })
}

/// Checks `password` against a stored digest.
pub fn verify(password: &str, digest: Option<&str>) -> bool {
    let Some(digest) = digest else {
        return false;
    };

    PasswordHash::new(digest)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let digest = hash("correct horse battery staple").expect("hash");

        assert!(digest.starts_with("$argon2"));
        assert!(verify("correct horse battery staple", Some(&digest)));
        assert!(!verify("Tr0ub4dor&3", Some(&digest)));
    }

    #[test]
    fn hashing_is_salted() {
        let first = hash("same").expect("hash");
        let second = hash("same").expect("hash");

        assert_ne!(first, second);
        assert!(verify("same", Some(&first)));
        assert!(verify("same", Some(&second)));
    }

    #[test]
    fn missing_digest_never_verifies() {
        assert!(!verify("anything", None));
        assert!(!verify("", None));
    }

    #[test]
    fn malformed_digest_never_verifies() {
        assert!(!verify("password", Some("not-a-phc-string")));
        assert!(!verify("password", Some("")));
    }
}
