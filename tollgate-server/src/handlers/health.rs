use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};

use crate::infra::app_state::AppState;
use tollgate_core::auth::BestEffort;

pub async fn live() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 503 when the database is unreachable. A failing cache only degrades.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match &state.postgres {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "ok",
            Err(err) => {
                tracing::error!(error = %err, "readiness: database ping failed");
                "unavailable"
            }
        },
        None => "in_memory",
    };

    let cache = match state.revocations().ping().await {
        BestEffort::Delivered => "ok",
        BestEffort::Skipped => "disabled",
        BestEffort::Failed(_) => "unavailable",
    };

    let (status_code, status) = if database == "unavailable" {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else if cache == "unavailable" {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "checked_at": Utc::now().to_rfc3339(),
            "checks": {
                "database": database,
                "cache": cache,
            }
        })),
    )
}
