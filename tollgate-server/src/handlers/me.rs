use axum::{Extension, Json, extract::State};

use super::auth::UserResponse;
use crate::infra::{app_state::AppState, errors::AppResult};
use tollgate_core::auth::AccessClaims;

pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
) -> AppResult<Json<UserResponse>> {
    let user = state.auth.current_user(claims.user_id()).await?;
    Ok(Json(user.into()))
}
