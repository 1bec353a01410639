//! Runtime configuration assembled from the environment and an optional
//! `.env` file.

pub mod loader;
pub mod sources;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use sources::EnvConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Test,
    Staging,
    Production,
}

impl AppEnv {
    /// Staging and production get `Secure` strict cookies and stricter
    /// secret checks.
    pub fn is_production_like(&self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Bound on every cache command.
    pub timeout: Duration,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Zeroizing<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub revocation_ttl: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("revocation_ttl", &self.revocation_ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub path: String,
    /// `Secure` plus `SameSite=Strict` when set, `SameSite=Lax` otherwise.
    pub secure: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: Zeroizing<String>,
    pub name: String,
}

impl fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub env_file_loaded: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: AppEnv,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub cookie: CookieConfig,
    pub cors: CorsConfig,
    pub admin_seed: Option<AdminSeed>,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Test environment with no cache and default TTLs.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            environment: AppEnv::Test,
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
            },
            redis: None,
            auth: AuthConfig {
                jwt_secret: Zeroizing::new(jwt_secret.to_string()),
                access_token_ttl: loader::DEFAULT_ACCESS_TOKEN_TTL,
                refresh_token_ttl: loader::DEFAULT_REFRESH_TOKEN_TTL,
                revocation_ttl: loader::DEFAULT_REVOCATION_TTL,
            },
            cookie: CookieConfig {
                path: loader::DEFAULT_REFRESH_COOKIE_PATH.into(),
                secure: false,
            },
            cors: CorsConfig::default(),
            admin_seed: None,
            metadata: ConfigMetadata::default(),
        }
    }
}
