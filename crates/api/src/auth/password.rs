//! Password hashing and verification (Argon2id)
//!
//! Verifiers are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`),
//! so the parameters used at hash time travel with the verifier and a
//! change in configured work factor does not invalidate existing records.

use argon2::{
    password_hash::{self, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};

/// Minimum accepted password length for new credentials
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Upper bound on password length; Argon2 input is unbounded otherwise
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// Lowest work factor accepted, as memory (KiB) × passes
pub const MIN_WORK_FACTOR: u64 = 16 * 1024;

const SALT_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("password hashing task failed: {0}")]
    Task(String),
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Hashes and verifies credentials with a fixed Argon2id configuration
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    /// Verifier for a random secret nobody knows; checked against when an
    /// account lookup misses so both paths pay the same hashing cost.
    decoy_hash: String,
}

impl PasswordService {
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let work = u64::from(config.memory_kib) * u64::from(config.iterations);
        if work < MIN_WORK_FACTOR {
            return Err(PasswordError::InvalidParams(format!(
                "memory_kib × iterations = {work}, minimum is {MIN_WORK_FACTOR}"
            )));
        }

        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy_hash = generate_impossible_hash_with(&argon2)?;

        Ok(Self { argon2, decoy_hash })
    }

    /// Hash a plaintext password into a salted PHC verifier
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, password)
    }

    /// Check a plaintext candidate against a stored verifier
    ///
    /// `Ok(false)` means the password does not match. A verifier that
    /// cannot be parsed or carries unusable parameters is an error. The
    /// digest comparison inside `argon2` is constant-time.
    pub fn check_password(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| PasswordError::Hash(format!("unreadable verifier: {e}")))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Hash(e.to_string())),
        }
    }

    /// Like `check_password`, treating malformed verifiers as a mismatch
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        self.check_password(password, hash).unwrap_or(false)
    }

    /// Burn one verification against the decoy verifier
    pub fn verify_decoy(&self, password: &str) {
        let _ = self.verify_password(password, &self.decoy_hash);
    }

    /// Run `hash_password` on the blocking pool
    pub async fn hash_password_blocking(&self, password: String) -> Result<String, PasswordError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.hash_password(&password))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    /// Run `check_password` on the blocking pool; `None` verifier hits the decoy
    pub async fn verify_password_blocking(
        &self,
        password: String,
        hash: Option<String>,
    ) -> Result<bool, PasswordError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => service.check_password(&password, &hash),
            None => {
                service.verify_decoy(&password);
                Ok(false)
            }
        })
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
    }
}

/// Check that a new password meets the length policy
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} bytes"
        ));
    }
    Ok(())
}

fn hash_with(argon2: &Argon2<'static>, password: &str) -> Result<String, PasswordError> {
    let salt_bytes: [u8; SALT_LEN] = rand::random();
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verifier for 32 random bytes that are immediately discarded
fn generate_impossible_hash_with(argon2: &Argon2<'static>) -> Result<String, PasswordError> {
    let secret: [u8; 32] = rand::random();
    let secret: String = secret.iter().map(|b| format!("{b:02x}")).collect();
    hash_with(argon2, &secret)
}
