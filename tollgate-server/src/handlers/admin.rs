use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::auth::{ApiJson, UserResponse};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};
use tollgate_core::auth::AccessClaims;
use tollgate_core::{AdminAudit, UserStats};

const DEFAULT_AUDIT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

pub async fn promote_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    ApiJson(request): ApiJson<PromoteRequest>,
) -> AppResult<Json<Value>> {
    let user = state
        .admin
        .promote_user(claims.user_id(), &request.email)
        .await?;
    Ok(Json(json!({
        "status": "promoted",
        "user": UserResponse::from(user),
    })))
}

pub async fn list_users(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.admin.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn list_audit(
    State(state): State<AppState>,
    query: Result<Query<AuditQuery>, axum::extract::rejection::QueryRejection>,
) -> AppResult<Json<Vec<AdminAudit>>> {
    let Query(query) = query.map_err(AppError::from)?;
    let entries = state
        .admin
        .list_audit(query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
        .await?;
    Ok(Json(entries))
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<UserStats>> {
    Ok(Json(state.admin.stats().await?))
}
