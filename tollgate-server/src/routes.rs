use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{admin, auth, health, me};
use crate::infra::{app_state::AppState, config::CorsConfig};
use crate::middleware::{require_admin, require_auth};

pub fn create_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready));

    let authenticated = Router::new()
        .route("/api/auth/logout-all", post(auth::logout_all))
        .route("/api/auth/password", post(auth::change_password))
        .route("/api/me", get(me::current_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Layers run bottom-up: authentication precedes the role check.
    let admin = Router::new()
        .route("/api/admin/promote", post(admin::promote_user))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/audit", get(admin::list_audit))
        .route("/api/admin/stats", get(admin::stats))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let cors = cors_layer(&state.config.cors);

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// An empty allow-list yields no CORS headers, so only same-origin callers
/// can use the API from a browser.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
