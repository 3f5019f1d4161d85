use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use super::ServerState;

/// Reports healthy once the database answers a trivial query.
pub async fn healthz(State(state): State<ServerState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!(error = ?e, "Health check query failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
