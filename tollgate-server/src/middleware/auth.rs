use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::infra::{app_state::AppState, errors::AppError};
use tollgate_core::auth::AccessClaims;
use tollgate_core::{AuthError, Role};

/// Verify the bearer token and attach its [`AccessClaims`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token =
        extract_bearer_token(&request).ok_or(AuthError::Unauthenticated)?;
    let claims = state.auth.verify_access_token(token)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Must be layered inside [`require_auth`].
pub async fn require_role(
    role: Role,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = request
        .extensions()
        .get::<AccessClaims>()
        .ok_or(AuthError::Unauthenticated)?;

    if claims.role != role {
        tracing::debug!(
            user_id = %claims.sub,
            required = %role,
            actual = %claims.role,
            "role check failed"
        );
        return Err(AuthError::Forbidden.into());
    }

    Ok(next.run(request).await)
}

pub async fn require_admin(
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(Role::Admin, request, next).await
}

pub fn extract_bearer_token(request: &Request) -> Option<&str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(value: &str) -> Request {
        Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn bearer_tokens_are_extracted() {
        let request = request_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&request), Some("abc.def.ghi"));

        let request = request_with("bearer abc");
        assert_eq!(extract_bearer_token(&request), Some("abc"));
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_ignored() {
        assert_eq!(extract_bearer_token(&request_with("Basic Zm9vOmJhcg==")), None);
        assert_eq!(extract_bearer_token(&request_with("Bearer ")), None);
        assert_eq!(extract_bearer_token(&request_with("Bearer")), None);

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_bearer_token(&request), None);
    }
}
