//! Provider status and selection endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Status of every known provider family, registered or not.
pub async fn provider_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "providers": state.router.status(),
        "current_provider": state.router.current_provider(),
        "current_model": state.router.current_model(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/providers/current
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SetProviderBody {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Make a provider the router's current default.
pub async fn set_provider(
    State(state): State<AppState>,
    Json(body): Json<SetProviderBody>,
) -> impl IntoResponse {
    if state
        .router
        .set_provider(&body.provider, body.model.as_deref())
    {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "provider": body.provider,
                "model": state.router.current_model(),
            })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("provider '{}' not available", body.provider),
            })),
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/providers/model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SetModelBody {
    pub model: String,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Select a model on the targeted (or current) provider.
pub async fn set_model(
    State(state): State<AppState>,
    Json(body): Json<SetModelBody>,
) -> impl IntoResponse {
    if state.router.set_model(&body.model, body.provider.as_deref()) {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "model": body.model,
                "provider": body.provider.or_else(|| state.router.current_provider()),
            })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("model '{}' rejected", body.model),
            })),
        )
    }
}
