use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to hash credential")]
    Hash,
}

/// Hashes and verifies account passwords. The stored value is an opaque
/// salted hash string; plaintext passwords never reach the repository.
pub trait CredentialVerifier: Send + Sync {
    fn hash_password(&self, password: &str) -> Result<String, CredentialError>;
    fn verify(&self, stored_hash: &str, password: &str) -> bool;
}

/// Argon2id with default parameters and a fresh random salt per password,
/// emitting PHC-formatted hash strings.
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn hash_password(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| CredentialError::Hash)
    }

    fn verify(&self, stored_hash: &str, password: &str) -> bool {
        // A stored hash that fails to parse is treated as a mismatch rather
        // than an error; the caller only learns pass/fail.
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
