use std::sync::Arc;

use vox_domain::config::Config;
use vox_monitor::Monitor;
use vox_providers::ProviderRouter;
use vox_sessions::SessionStore;
use vox_speech::SpeechProcessor;

/// Shared application state passed to all API handlers and connection
/// tasks. Explicitly constructed at startup and dependency-injected —
/// nothing here is ambient.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Registry of live sessions; exclusively owns them.
    pub sessions: Arc<SessionStore>,
    /// Provider adapters + fallback dispatch.
    pub router: Arc<ProviderRouter>,

    // ── External collaborators ────────────────────────────────────────
    pub speech: Arc<dyn SpeechProcessor>,
    pub monitor: Arc<dyn Monitor>,
}
