use std::fmt;
use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
};
use password_hash::Error as PasswordHashError;
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),
    #[error("password hashing error: {0}")]
    Hash(String),
    #[error("password hashing task failed: {0}")]
    Task(String),
}

impl From<PasswordHashError> for PasswordError {
    fn from(err: PasswordHashError) -> Self {
        PasswordError::Hash(err.to_string())
    }
}

/// Argon2id password hashing.
///
/// Hashing and verification are CPU bound and run on the blocking pool.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Arc<Argon2<'static>>,
    /// Valid PHC string verified against when the account does not exist, so
    /// unknown emails cost the same as wrong passwords.
    dummy_hash: Arc<str>,
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("algorithm", &Algorithm::Argon2id)
            .finish_non_exhaustive()
    }
}

impl PasswordHasher {
    /// ~64 MiB memory and 3 iterations.
    const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
    const DEFAULT_ITERATIONS: u32 = 3;
    const DEFAULT_PARALLELISM: u32 = 1;
    const SALT_LENGTH: usize = password_hash::Salt::RECOMMENDED_LENGTH;

    pub fn new() -> Result<Self, PasswordError> {
        Self::with_params(
            ParamsBuilder::new()
                .m_cost(Self::DEFAULT_MEMORY_KIB)
                .t_cost(Self::DEFAULT_ITERATIONS)
                .p_cost(Self::DEFAULT_PARALLELISM)
                .output_len(32)
                .build()
                .map_err(|err| PasswordError::InvalidParams(err.to_string()))?,
        )
    }

    /// Caller-specified Argon2 parameters, mainly for fast tests.
    pub fn with_params(params: Params) -> Result<Self, PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::default(), params);
        let dummy_hash = hash_with(&argon2, "tollgate-timing-equaliser")?;
        Ok(Self {
            argon2: Arc::new(argon2),
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Cheapest parameters Argon2 accepts.
    pub fn insecure_fast() -> Result<Self, PasswordError> {
        let params = ParamsBuilder::new()
            .m_cost(Params::MIN_M_COST)
            .t_cost(Params::MIN_T_COST)
            .p_cost(Params::MIN_P_COST)
            .build()
            .map_err(|err| PasswordError::InvalidParams(err.to_string()))?;
        Self::with_params(params)
    }

    /// Hash a password into a PHC string suitable for storage.
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let argon2 = Arc::clone(&self.argon2);
        let password = Zeroizing::new(password.to_string());
        tokio::task::spawn_blocking(move || hash_with(&argon2, &password))
            .await
            .map_err(|err| PasswordError::Task(err.to_string()))?
    }

    /// Verify a password against a stored PHC string.
    pub async fn verify(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, PasswordError> {
        let argon2 = Arc::clone(&self.argon2);
        let password = Zeroizing::new(password.to_string());
        let stored = password_hash.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, PasswordError> {
            let parsed = PasswordHash::new(&stored)?;
            Ok(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|err| PasswordError::Task(err.to_string()))?
    }

    /// Burn one verification against the dummy hash. The result is discarded.
    pub async fn verify_dummy(&self, password: &str) {
        let dummy = Arc::clone(&self.dummy_hash);
        let _ = self.verify(password, &dummy).await;
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; PasswordHasher::SALT_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|err| PasswordError::Hash(err.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)?;
    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_passwords_and_verifies() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let hash = hasher.hash("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn salts_every_hash() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let a = hasher.hash("same-password").await.unwrap();
        let b = hasher.hash("same-password").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error_not_a_match() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        assert!(hasher.verify("anything", "not-a-phc-string").await.is_err());
    }

    #[test]
    fn default_parameters_are_accepted() {
        assert!(PasswordHasher::new().is_ok());
    }
}
