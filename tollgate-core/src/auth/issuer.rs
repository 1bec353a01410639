use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::RefreshSecret;
use crate::domain::Role;

/// Floor for opaque secret entropy, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("signing key is not configured")]
    MissingKey,
    #[error("failed to sign access token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("secure random source unavailable: {0}")]
    Entropy(String),
    #[error("access token rejected: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
}

/// Claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token so two tokens minted in the same second differ.
    pub jti: Uuid,
}

impl AccessClaims {
    pub fn user_id(&self) -> Uuid {
        self.sub
    }
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints HS256 access tokens and opaque refresh secrets.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(signing_secret: impl AsRef<[u8]>) -> Result<Self, IssuerError> {
        let secret = Zeroizing::new(signing_secret.as_ref().to_vec());
        if secret.is_empty() {
            return Err(IssuerError::MissingKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            validation,
        })
    }

    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        role: Role,
        ttl: Duration,
    ) -> Result<AccessToken, IssuerError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = AccessClaims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(IssuerError::Signing)?;

        Ok(AccessToken { token, expires_at })
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify_access_token(
        &self,
        token: &str,
    ) -> Result<AccessClaims, IssuerError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(IssuerError::InvalidToken)
    }

    /// Random URL-safe secret backed by at least [`MIN_SECRET_BYTES`] bytes
    /// from the operating system RNG. There is no fallback source.
    pub fn generate_opaque_secret(
        &self,
        byte_length: usize,
    ) -> Result<RefreshSecret, IssuerError> {
        let mut bytes = Zeroizing::new(vec![0u8; byte_length.max(MIN_SECRET_BYTES)]);
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| IssuerError::Entropy(err.to_string()))?;
        Ok(RefreshSecret::new(URL_SAFE_NO_PAD.encode(bytes.as_slice())))
    }

    /// Hex SHA-256 digest used as the storage and lookup key for a secret.
    pub fn hash_secret(&self, raw_secret: &str) -> String {
        hash_secret(raw_secret)
    }
}

pub fn hash_secret(raw_secret: &str) -> String {
    hex::encode(Sha256::digest(raw_secret.as_bytes()))
}
