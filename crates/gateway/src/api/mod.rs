pub mod providers;
pub mod sessions;
pub mod system;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health (used by probes)
        .route("/health", get(system::health))
        // Session management
        .route(
            "/v1/sessions",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route("/v1/sessions/:id", delete(sessions::delete_session))
        // The persistent channel, addressed by session id
        .route("/v1/ws/:session_id", get(crate::ws::session_ws))
        // Providers / models
        .route("/v1/providers", get(providers::provider_status))
        .route("/v1/providers/current", post(providers::set_provider))
        .route("/v1/providers/model", post(providers::set_model))
}
