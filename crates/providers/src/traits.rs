use serde::{Deserialize, Serialize};

use vox_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One prior exchange passed as conversation context.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub user: String,
    pub assistant: String,
}

/// Relative pricing bucket for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Free,
    Low,
    Medium,
    High,
}

/// One entry in an adapter's model catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub available: bool,
    pub cost_tier: CostTier,
}

/// The normalized result of a routed chat call.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub text: String,
    /// Provider that actually produced the response.
    pub provider: String,
    /// Model that actually produced the response.
    pub model: String,
    /// True when the responding provider differs from the requested one.
    pub fallback_used: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Capability every backend adapter must provide.
///
/// Adapters own their model catalog, current-model selection, and health
/// flag behind interior mutability; the router holds them as
/// `Arc<dyn ChatProvider>` and never locks across their async calls.
///
/// The health flag is refreshed only by [`ChatProvider::health_check`]
/// (at startup and on periodic sweeps). A failed [`ChatProvider::chat`]
/// call must NOT flip it; the router handles that failure by falling back
/// for that one request.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable provider name (e.g. "openai", "claude", "ollama").
    fn name(&self) -> &str;

    /// Fetch the model catalog, pick a default model, and run the startup
    /// health check.
    async fn initialize(&self);

    /// Send one chat completion. `model` overrides the adapter's current
    /// model for this request only. An empty completion is an error.
    async fn chat(
        &self,
        message: &str,
        history: &[HistoryTurn],
        model: Option<&str>,
    ) -> Result<String>;

    /// Probe the backend, update the health flag, and return it.
    async fn health_check(&self) -> bool;

    /// Cached model catalog.
    fn list_models(&self) -> Vec<ModelInfo>;

    /// Select the current model. Returns `false` when the adapter rejects
    /// the model id, leaving the current selection unchanged.
    fn set_model(&self, model: &str) -> bool;

    /// The currently selected model, if any.
    fn current_model(&self) -> Option<String>;

    /// Last value recorded by a health check.
    fn is_healthy(&self) -> bool;

    /// Whether this adapter kind needs a credential at all.
    fn requires_credential(&self) -> bool;

    /// Whether a credential is present (trivially true when none is
    /// required).
    fn has_credential(&self) -> bool;

    /// Available = credential present (or not required) AND healthy.
    fn is_available(&self) -> bool {
        self.has_credential() && self.is_healthy()
    }
}
