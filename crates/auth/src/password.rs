//! Password hashing with Argon2id.
//!
//! Digests are PHC strings, so the parameters travel with the hash and
//! verification needs no separate parameter storage. Plaintext is never
//! logged, on any path.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::{AuthError, AuthResult};

/// A well-formed Argon2id digest with no known preimage.
///
/// Login verifies against this when no credential matches the email, so the
/// response time does not reveal whether an account exists.
pub const IMPOSSIBLE_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

/// Hash a plaintext password into a salted, self-describing digest.
///
/// Deliberately expensive; async callers should run this on the blocking
/// thread pool.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Internal(format!("password hashing failed: {err}")))
}

/// Verify a plaintext password against a stored digest.
///
/// Never errors: a malformed digest simply fails verification.
pub fn verify_password(password: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let digest = hash_password("password123").unwrap();
        assert!(verify_password("password123", &digest));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let digest = hash_password("password123").unwrap();
        assert!(!verify_password("password124", &digest));
        assert!(!verify_password("", &digest));
    }

    #[test]
    fn digest_is_salted_and_self_describing() {
        let first = hash_password("password123").unwrap();
        let second = hash_password("password123").unwrap();

        assert_ne!(first, second, "each digest gets a fresh salt");
        assert!(first.starts_with("$argon2id$"), "parameters are embedded: {first}");
    }

    #[test]
    fn verify_handles_malformed_digest_without_panicking() {
        assert!(!verify_password("password123", ""));
        assert!(!verify_password("password123", "not-a-digest"));
        assert!(!verify_password("password123", "$argon2id$garbage"));
    }

    #[test]
    fn impossible_hash_parses_but_never_verifies() {
        assert!(PasswordHash::new(IMPOSSIBLE_HASH).is_ok());
        assert!(!verify_password("password123", IMPOSSIBLE_HASH));
        assert!(!verify_password("", IMPOSSIBLE_HASH));
    }
}
