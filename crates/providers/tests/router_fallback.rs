//! Integration tests for the fallback router — full dispatch flow with a
//! scripted in-memory adapter, no network required. All tests are pure
//! and deterministic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use vox_domain::error::{Error, Result};
use vox_providers::router::ProviderRouter;
use vox_providers::traits::{ChatProvider, CostTier, HistoryTurn, ModelInfo};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted mock adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct MockProvider {
    name: String,
    healthy: AtomicBool,
    /// Value the next health check will record.
    sweep_health: bool,
    requires_credential: bool,
    current_model: RwLock<Option<String>>,
    valid_models: Vec<String>,
    /// Scripted chat results, popped per call; empty queue answers
    /// "mock reply".
    script: RwLock<VecDeque<Result<String>>>,
    calls: AtomicUsize,
    /// Model override observed on each chat call.
    seen_models: RwLock<Vec<Option<String>>>,
}

impl MockProvider {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            healthy: AtomicBool::new(true),
            sweep_health: true,
            requires_credential: true,
            current_model: RwLock::new(Some(format!("{name}-default"))),
            valid_models: vec![format!("{name}-default"), format!("{name}-large")],
            script: RwLock::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            seen_models: RwLock::new(Vec::new()),
        }
    }

    fn failing(name: &str) -> Self {
        let mock = Self::new(name);
        mock.script.write().push_back(Err(Error::Provider {
            provider: name.to_owned(),
            message: "scripted failure".into(),
        }));
        mock
    }

    fn unhealthy(name: &str) -> Self {
        let mock = Self::new(name);
        mock.healthy.store(false, Ordering::SeqCst);
        mock
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) {}

    async fn chat(
        &self,
        _message: &str,
        _history: &[HistoryTurn],
        model: Option<&str>,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_models.write().push(model.map(str::to_owned));
        match self.script.write().pop_front() {
            Some(result) => result,
            None => Ok("mock reply".into()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy.store(self.sweep_health, Ordering::SeqCst);
        self.sweep_health
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        self.valid_models
            .iter()
            .map(|id| ModelInfo {
                id: id.clone(),
                name: id.clone(),
                available: true,
                cost_tier: CostTier::Low,
            })
            .collect()
    }

    fn set_model(&self, model: &str) -> bool {
        if self.valid_models.iter().any(|m| m == model) {
            *self.current_model.write() = Some(model.to_owned());
            true
        } else {
            false
        }
    }

    fn current_model(&self) -> Option<String> {
        self.current_model.read().clone()
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn requires_credential(&self) -> bool {
        self.requires_credential
    }

    fn has_credential(&self) -> bool {
        true
    }
}

fn router_of(mocks: Vec<Arc<MockProvider>>, chain: &[&str]) -> ProviderRouter {
    let providers: HashMap<String, Arc<dyn ChatProvider>> = mocks
        .into_iter()
        .map(|m| (m.name.clone(), m as Arc<dyn ChatProvider>))
        .collect();
    ProviderRouter::new(
        providers,
        chain.iter().map(|s| (*s).to_owned()).collect(),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fallback walk
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn chain_walks_in_order_each_provider_once() {
    let a = Arc::new(MockProvider::failing("a"));
    let b = Arc::new(MockProvider::failing("b"));
    let c = Arc::new(MockProvider::new("c"));
    let router = router_of(vec![a.clone(), b.clone(), c.clone()], &["a", "b", "c"]);

    let outcome = router.chat("hi", &[], None, None).await.unwrap();

    assert_eq!(outcome.provider, "c");
    assert_eq!(outcome.model, "c-default");
    assert!(outcome.fallback_used);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 1);
}

#[tokio::test]
async fn success_on_first_provider_uses_no_fallback() {
    let a = Arc::new(MockProvider::new("a"));
    let b = Arc::new(MockProvider::new("b"));
    let router = router_of(vec![a.clone(), b.clone()], &["a", "b"]);

    let outcome = router.chat("hi", &[], None, None).await.unwrap();

    assert_eq!(outcome.provider, "a");
    assert!(!outcome.fallback_used);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn unavailable_provider_is_skipped_without_invocation() {
    let a = Arc::new(MockProvider::failing("a"));
    let b = Arc::new(MockProvider::unhealthy("b"));
    let c = Arc::new(MockProvider::new("c"));
    let router = router_of(vec![a.clone(), b.clone(), c.clone()], &["a", "b", "c"]);

    let outcome = router.chat("hi", &[], None, None).await.unwrap();

    assert_eq!(outcome.provider, "c");
    assert_eq!(b.calls(), 0, "unavailable provider must not be invoked");
}

#[tokio::test]
async fn all_failing_raises_all_providers_failed() {
    let a = Arc::new(MockProvider::failing("a"));
    let b = Arc::new(MockProvider::failing("b"));
    let router = router_of(vec![a.clone(), b.clone()], &["a", "b"]);

    let err = router.chat("hi", &[], None, None).await.unwrap_err();
    assert!(matches!(err, Error::AllProvidersFailed));
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn empty_registry_fails_without_invoking_anything() {
    let router = router_of(vec![], &["a", "b", "c"]);

    // An explicitly requested provider walks the (empty) registry and
    // exhausts the chain.
    let err = router.chat("hi", &[], Some("a"), None).await.unwrap_err();
    assert!(matches!(err, Error::AllProvidersFailed));

    // With no request and no default, the router is in no-provider mode.
    let err = router.chat("hi", &[], None, None).await.unwrap_err();
    assert!(matches!(err, Error::NoProviderAvailable));
}

#[tokio::test]
async fn empty_completion_counts_as_failure() {
    let a = Arc::new(MockProvider::new("a"));
    a.script.write().push_back(Ok("   ".into()));
    let b = Arc::new(MockProvider::new("b"));
    let router = router_of(vec![a.clone(), b.clone()], &["a", "b"]);

    let outcome = router.chat("hi", &[], None, None).await.unwrap();
    assert_eq!(outcome.provider, "b");
    assert!(outcome.fallback_used);
}

#[tokio::test]
async fn requested_model_applies_only_to_first_attempt() {
    let a = Arc::new(MockProvider::failing("a"));
    let b = Arc::new(MockProvider::new("b"));
    let router = router_of(vec![a.clone(), b.clone()], &["a", "b"]);

    let outcome = router
        .chat("hi", &[], Some("a"), Some("a-large"))
        .await
        .unwrap();

    assert_eq!(a.seen_models.read()[0].as_deref(), Some("a-large"));
    // The fallback candidate used its own current model, not the caller's.
    assert_eq!(b.seen_models.read()[0].as_deref(), Some("b-default"));
    assert_eq!(outcome.model, "b-default");
}

#[tokio::test]
async fn chat_failure_does_not_flip_availability() {
    let a = Arc::new(MockProvider::new("a"));
    a.script.write().push_back(Err(Error::Provider {
        provider: "a".into(),
        message: "transient".into(),
    }));
    let b = Arc::new(MockProvider::new("b"));
    let router = router_of(vec![a.clone(), b.clone()], &["a", "b"]);

    let first = router.chat("hi", &[], None, None).await.unwrap();
    assert_eq!(first.provider, "b");

    // The failed provider stays nominally available between sweeps and is
    // attempted again on the next call.
    assert!(a.is_available());
    let second = router.chat("hi", &[], None, None).await.unwrap();
    assert_eq!(second.provider, "a");
    assert_eq!(a.calls(), 2);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn set_provider_validates_registration_and_availability() {
    let a = Arc::new(MockProvider::new("a"));
    let b = Arc::new(MockProvider::unhealthy("b"));
    let router = router_of(vec![a, b], &["a", "b"]);

    assert!(!router.set_provider("nope", None));
    assert!(!router.set_provider("b", None));
    assert!(router.set_provider("a", None));
    assert_eq!(router.current_provider().as_deref(), Some("a"));
}

#[tokio::test]
async fn set_provider_with_invalid_model_keeps_adapter_model() {
    let a = Arc::new(MockProvider::new("a"));
    let router = router_of(vec![a], &["a"]);

    // The provider switch succeeds; the bogus model falls back to the
    // adapter's own current model.
    assert!(router.set_provider("a", Some("made-up-model")));
    assert_eq!(router.current_model().as_deref(), Some("a-default"));

    assert!(router.set_provider("a", Some("a-large")));
    assert_eq!(router.current_model().as_deref(), Some("a-large"));
}

#[tokio::test]
async fn set_model_rejection_leaves_router_state_unchanged() {
    let a = Arc::new(MockProvider::new("a"));
    let router = router_of(vec![a], &["a"]);
    assert!(router.set_provider("a", None));

    assert!(!router.set_model("made-up-model", None));
    assert_eq!(router.current_model().as_deref(), Some("a-default"));

    assert!(router.set_model("a-large", None));
    assert_eq!(router.current_model().as_deref(), Some("a-large"));
}

#[tokio::test]
async fn set_model_targets_non_current_provider_without_switching() {
    let a = Arc::new(MockProvider::new("a"));
    let b = Arc::new(MockProvider::new("b"));
    let router = router_of(vec![a, b.clone()], &["a", "b"]);
    assert!(router.set_provider("a", None));

    assert!(router.set_model("b-large", Some("b")));
    // The router's default selection is untouched.
    assert_eq!(router.current_provider().as_deref(), Some("a"));
    assert_eq!(router.current_model().as_deref(), Some("a-default"));
    assert_eq!(b.current_model().as_deref(), Some("b-large"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default election
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn default_election_follows_chain_priority() {
    let a = Arc::new(MockProvider::unhealthy("a"));
    let b = Arc::new(MockProvider::new("b"));
    let router = router_of(vec![a, b], &["a", "b"]);

    assert_eq!(router.current_provider().as_deref(), Some("b"));
}

#[tokio::test]
async fn local_provider_without_model_is_not_elected() {
    let mut local = MockProvider::new("ollama");
    local.requires_credential = false;
    *local.current_model.write() = None;
    let router = router_of(vec![Arc::new(local)], &["ollama"]);

    assert!(router.current_provider().is_none());
    let err = router.chat("hi", &[], None, None).await.unwrap_err();
    assert!(matches!(err, Error::NoProviderAvailable));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status & health
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn status_includes_unregistered_families() {
    let a = Arc::new(MockProvider::new("openai"));
    let router = router_of(vec![a], &["openai"]);

    let status = router.status();
    assert!(status["openai"].available);
    // Known-but-never-registered families report all-false entries.
    for family in ["claude", "xai", "lm_studio", "ollama"] {
        let entry = &status[family];
        assert!(!entry.available);
        assert!(!entry.healthy);
        assert!(entry.current_model.is_none());
        assert!(entry.models.is_empty());
    }
}

#[tokio::test]
async fn health_check_all_updates_each_flag_independently() {
    let mut going_down = MockProvider::new("a");
    going_down.sweep_health = false;
    let going_down = Arc::new(going_down);

    let mut coming_up = MockProvider::unhealthy("b");
    coming_up.sweep_health = true;
    let coming_up = Arc::new(coming_up);

    let router = router_of(vec![going_down.clone(), coming_up.clone()], &["a", "b"]);

    router.health_check_all().await;

    assert!(!going_down.is_healthy(), "sweep must demote a");
    assert!(coming_up.is_healthy(), "one failing check must not block b's promotion");
}
