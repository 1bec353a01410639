use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

use super::sources::EnvConfig;
use super::{
    AdminSeed, AppEnv, AuthConfig, Config, ConfigMetadata, CookieConfig,
    CorsConfig, DatabaseConfig, RedisConfig, ServerConfig,
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REVOCATION_TTL: Duration =
    Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_REFRESH_COOKIE_PATH: &str = "/api/auth";
pub const DEFAULT_ADMIN_NAME: &str = "Administrator";
/// HS256 keys shorter than this are refused outside development.
pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    env_file: Option<PathBuf>,
}

/// A loaded configuration plus non-fatal findings worth logging.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Read the `.env` file (if any) into the process environment, then
    /// compose the configuration from it.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let loaded = match &self.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };
        let env_file_loaded = loaded.or_else(|err| match err {
            dotenvy::Error::Io(_) => Ok(false),
            _ => Err(err),
        })?;

        compose(EnvConfig::gather(), env_file_loaded)
    }
}

/// Build a [`Config`] from raw values without touching the process
/// environment.
pub fn compose(
    env: EnvConfig,
    env_file_loaded: bool,
) -> Result<ConfigLoad, ConfigLoadError> {
    let mut warnings = Vec::new();

    let environment = required(env.app_env, "APP_ENV")?
        .parse::<AppEnv>()
        .map_err(|reason| ConfigLoadError::Invalid {
            name: "APP_ENV",
            reason,
        })?;

    let server = ServerConfig {
        host: env.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_number(env.port, "PORT", DEFAULT_PORT)?,
    };

    let database = DatabaseConfig {
        url: required(env.database_url, "DATABASE_URL")?,
        max_connections: parse_number(
            env.database_max_connections,
            "DATABASE_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?,
    };

    let cache_timeout =
        parse_duration(env.cache_timeout, "CACHE_TIMEOUT", DEFAULT_CACHE_TIMEOUT)?;
    let redis = match env.redis_url {
        Some(url) => Some(RedisConfig {
            url,
            timeout: cache_timeout,
        }),
        None => {
            warnings.push(
                "REDIS_URL is not set; revocations are enforced by the database only"
                    .to_string(),
            );
            None
        }
    };

    let jwt_secret = required(env.jwt_secret, "JWT_SECRET")?;
    if environment.is_production_like()
        && jwt_secret.len() < MIN_PRODUCTION_SECRET_BYTES
    {
        return Err(ConfigLoadError::WeakSecret {
            environment,
            min: MIN_PRODUCTION_SECRET_BYTES,
        });
    }
    if jwt_secret.len() < MIN_PRODUCTION_SECRET_BYTES {
        warnings.push(format!(
            "JWT_SECRET is shorter than {MIN_PRODUCTION_SECRET_BYTES} bytes"
        ));
    }

    let access_token_ttl = parse_duration(
        env.access_token_ttl,
        "ACCESS_TOKEN_TTL",
        DEFAULT_ACCESS_TOKEN_TTL,
    )?;
    let refresh_token_ttl = parse_duration(
        env.refresh_token_ttl,
        "REFRESH_TOKEN_TTL",
        DEFAULT_REFRESH_TOKEN_TTL,
    )?;
    let mut revocation_ttl =
        parse_duration(env.revocation_ttl, "REVOCATION_TTL", DEFAULT_REVOCATION_TTL)?;
    if revocation_ttl < refresh_token_ttl {
        warnings.push(
            "REVOCATION_TTL is shorter than REFRESH_TOKEN_TTL; using REFRESH_TOKEN_TTL"
                .to_string(),
        );
        revocation_ttl = refresh_token_ttl;
    }

    let cookie = CookieConfig {
        path: env
            .refresh_cookie_path
            .unwrap_or_else(|| DEFAULT_REFRESH_COOKIE_PATH.to_string()),
        secure: environment.is_production_like(),
    };
    if !cookie.path.starts_with('/') {
        return Err(ConfigLoadError::Invalid {
            name: "REFRESH_COOKIE_PATH",
            reason: "must start with '/'".to_string(),
        });
    }

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let admin_seed = if env.admin_seed.as_deref().and_then(parse_bool).unwrap_or(false)
    {
        Some(AdminSeed {
            email: required(env.admin_email, "ADMIN_EMAIL")?,
            password: Zeroizing::new(required(env.admin_password, "ADMIN_PASSWORD")?),
            name: env
                .admin_name
                .unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
        })
    } else {
        None
    };

    let config = Config {
        environment,
        server,
        database,
        redis,
        auth: AuthConfig {
            jwt_secret: Zeroizing::new(jwt_secret),
            access_token_ttl,
            refresh_token_ttl,
            revocation_ttl,
        },
        cookie,
        cors,
        admin_seed,
        metadata: ConfigMetadata { env_file_loaded },
    };

    Ok(ConfigLoad { config, warnings })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("JWT_SECRET must be at least {min} bytes in {environment}")]
    WeakSecret { environment: AppEnv, min: usize },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

fn required(
    value: Option<String>,
    name: &'static str,
) -> Result<String, ConfigLoadError> {
    value.ok_or(ConfigLoadError::Missing(name))
}

fn parse_number<T>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigLoadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| {
            ConfigLoadError::Invalid {
                name,
                reason: err.to_string(),
            }
        }),
        None => Ok(default),
    }
}

fn parse_duration(
    value: Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    let parsed = humantime::parse_duration(raw.trim()).map_err(|err| {
        ConfigLoadError::Invalid {
            name,
            reason: err.to_string(),
        }
    })?;
    if parsed.is_zero() {
        return Err(ConfigLoadError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
