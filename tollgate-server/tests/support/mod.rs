#![allow(dead_code)]

use std::sync::Arc;

use axum_test::{TestResponse, TestServer};
use serde_json::{Value, json};

use tollgate_core::auth::{InMemoryRevocationCache, PasswordHasher, RevocationCache};
use tollgate_core::{Role, User};
use tollgate_server::infra::app_state::{AppState, Repositories};
use tollgate_server::infra::config::Config;
use tollgate_server::routes::create_app;

pub const JWT_SECRET: &str = "integration-test-signing-secret-0123456789";
pub const PASSWORD: &str = "secret1";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub repositories: Repositories,
    pub cache: Option<InMemoryRevocationCache>,
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn cookie_header(secret: &str) -> String {
    format!("refresh_token={secret}")
}

fn build(
    config: Config,
    repositories: Repositories,
    cache: Option<InMemoryRevocationCache>,
) -> TestApp {
    let hasher = PasswordHasher::insecure_fast().unwrap();
    let dyn_cache = cache
        .clone()
        .map(|cache| Arc::new(cache) as Arc<dyn RevocationCache>);
    let state = AppState::from_parts(
        Arc::new(config),
        repositories.clone(),
        dyn_cache,
        hasher,
        None,
    )
    .unwrap();
    let server = TestServer::new(create_app(state.clone())).unwrap();
    TestApp {
        server,
        state,
        repositories,
        cache,
    }
}

/// App over in-memory repositories with no revocation cache.
pub fn app() -> TestApp {
    build(Config::for_tests(JWT_SECRET), Repositories::in_memory(), None)
}

/// App over in-memory repositories with an in-process revocation cache.
pub fn app_with_cache() -> TestApp {
    build(
        Config::for_tests(JWT_SECRET),
        Repositories::in_memory(),
        Some(InMemoryRevocationCache::default()),
    )
}

pub fn app_with_config(config: Config) -> TestApp {
    build(config, Repositories::in_memory(), None)
}

pub fn app_with_repositories(repositories: Repositories) -> TestApp {
    build(Config::for_tests(JWT_SECRET), repositories, None)
}

/// Access token and raw refresh secret from an auth response.
pub struct Tokens {
    pub access: String,
    pub refresh: String,
    pub body: Value,
}

pub fn tokens(response: &TestResponse) -> Tokens {
    let body = response.json::<Value>();
    let access = body["token"].as_str().unwrap().to_string();
    let refresh = response.cookie("refresh_token").value().to_string();
    Tokens {
        access,
        refresh,
        body,
    }
}

impl TestApp {
    pub async fn register(&self, email: &str, name: &str) -> Tokens {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({ "email": email, "password": PASSWORD, "name": name }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        tokens(&response)
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .await
    }

    pub async fn refresh(&self, secret: &str) -> TestResponse {
        self.server
            .post("/api/auth/refresh")
            .add_header("Cookie", cookie_header(secret))
            .await
    }

    /// Insert an admin directly and log in as them.
    pub async fn admin(&self, email: &str) -> Tokens {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let hash = hasher.hash(PASSWORD).await.unwrap();
        let admin = User::new(email.into(), "Admin".into(), hash, Role::Admin);
        self.repositories.users.create(&admin).await.unwrap();

        let response = self.login(email, PASSWORD).await;
        response.assert_status_ok();
        tokens(&response)
    }
}
