use std::collections::HashMap;

/// Raw environment values, before parsing or defaults.
#[derive(Default, Clone)]
pub struct EnvConfig {
    pub app_env: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub access_token_ttl: Option<String>,
    pub refresh_token_ttl: Option<String>,
    pub revocation_ttl: Option<String>,
    pub cache_timeout: Option<String>,
    pub refresh_cookie_path: Option<String>,
    pub cors_allowed_origins: Option<String>,
    pub admin_seed: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub admin_name: Option<String>,
}

impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("app_env", &self.app_env)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("redis_url", &self.redis_url.is_some())
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl EnvConfig {
    /// Snapshot the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(values: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            app_env: var("APP_ENV"),
            host: var("HOST"),
            port: var("PORT"),
            database_url: var("DATABASE_URL"),
            database_max_connections: var("DATABASE_MAX_CONNECTIONS"),
            redis_url: var("REDIS_URL"),
            jwt_secret: var("JWT_SECRET"),
            access_token_ttl: var("ACCESS_TOKEN_TTL"),
            refresh_token_ttl: var("REFRESH_TOKEN_TTL"),
            revocation_ttl: var("REVOCATION_TTL"),
            cache_timeout: var("CACHE_TIMEOUT"),
            refresh_cookie_path: var("REFRESH_COOKIE_PATH"),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
            admin_seed: var("ADMIN_SEED"),
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
            admin_name: var("ADMIN_NAME"),
        }
    }
}
