//! Health endpoint.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// GET /health — liveness plus a few counters.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "active_sessions": state.sessions.count(),
        "providers_registered": state.router.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
