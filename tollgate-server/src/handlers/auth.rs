use axum::{
    Extension, Json,
    extract::{FromRequest, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::cookies::{clear_refresh_cookie, refresh_secret, set_refresh_cookie};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};
use tollgate_core::auth::AccessClaims;
use tollgate_core::domain::user::{
    ChangePasswordRequest, LoginRequest, RegisterRequest,
};
use tollgate_core::{AuthError, Role, Session, User};

/// JSON body extractor whose rejections use the API error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

type SessionReply = (CookieJar, Json<AuthResponse>);

fn session_reply(state: &AppState, jar: CookieJar, session: Session) -> SessionReply {
    let jar = set_refresh_cookie(jar, &state.config.cookie, &session.refresh);
    let body = AuthResponse {
        token: session.access_token.token,
        token_type: "Bearer",
        expires_at: session.access_token.expires_at,
        user: session.user.into(),
    };
    (jar, Json(body))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let session = state.auth.register(request).await?;
    let (jar, body) = session_reply(&state, jar, session);
    Ok((StatusCode::CREATED, jar, body))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<SessionReply> {
    let session = state.auth.login(request).await?;
    Ok(session_reply(&state, jar, session))
}

/// Rotate the refresh cookie. A rejected cookie is cleared; store failures
/// leave it in place so the client can retry.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<SessionReply, (CookieJar, AppError)> {
    let secret = refresh_secret(&jar);
    match state.auth.refresh(secret.as_deref()).await {
        Ok(session) => Ok(session_reply(&state, jar, session)),
        Err(err @ AuthError::InvalidCredentials) => {
            let jar = clear_refresh_cookie(jar, &state.config.cookie);
            Err((jar, err.into()))
        }
        Err(err) => Err((jar, err.into())),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<Value>)> {
    let secret = refresh_secret(&jar);
    state.auth.logout(secret.as_deref()).await?;
    let jar = clear_refresh_cookie(jar, &state.config.cookie);
    Ok((jar, Json(json!({ "status": "logged_out" }))))
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<Value>)> {
    let revoked = state.auth.logout_everywhere(claims.user_id()).await?;
    let jar = clear_refresh_cookie(jar, &state.config.cookie);
    Ok((
        jar,
        Json(json!({ "status": "logged_out", "revoked": revoked })),
    ))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    jar: CookieJar,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> AppResult<(StatusCode, CookieJar)> {
    state
        .auth
        .change_password(claims.user_id(), request)
        .await?;
    let jar = clear_refresh_cookie(jar, &state.config.cookie);
    Ok((StatusCode::NO_CONTENT, jar))
}
