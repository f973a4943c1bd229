//! Salted one-way hashing of one-time codes.
//!
//! Uses Argon2id with a fresh random salt per code. Stored hashes are PHC
//! strings, so verification reads the parameters back from the hash and
//! keeps working after the configured cost changes.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::config::OtpConfig;

/// Code hashing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The configured Argon2 parameters were rejected.
    #[error("invalid hash parameters: {0}")]
    Params(String),

    /// Hashing failed.
    #[error("code hashing failed: {0}")]
    Hash(String),

    /// A stored hash could not be parsed.
    #[error("invalid code hash format")]
    InvalidHash,
}

/// Argon2id hasher for one-time codes.
#[derive(Debug, Clone)]
pub struct CodeHasher {
    params: Params,
}

impl Default for CodeHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CodeHasher {
    /// Create a hasher with explicit Argon2 costs.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        Ok(Self { params })
    }

    /// Create a hasher from the `[otp]` configuration section.
    pub fn from_config(config: &OtpConfig) -> Result<Self, HashError> {
        Self::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a code with a fresh salt.
    pub fn hash(&self, code: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(code.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a candidate against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch and `Err(InvalidHash)` only when the
    /// stored value is not a PHC string.
    pub fn verify(&self, candidate: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = parse_argon2(hash).ok_or(HashError::InvalidHash)?;
        // Cost parameters are taken from the stored hash, not from `self`.
        Ok(self
            .argon2()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok())
    }

    /// Check if a stored value is an Argon2 PHC string this hasher can verify.
    pub fn is_supported(hash: &str) -> bool {
        parse_argon2(hash).is_some()
    }
}

fn parse_argon2(hash: &str) -> Option<PasswordHash<'_>> {
    let parsed = PasswordHash::new(hash).ok()?;
    matches!(parsed.algorithm.as_str(), "argon2id" | "argon2i" | "argon2d").then_some(parsed)
}
