//! Fallback router over the registered provider adapters.
//!
//! The router owns a fixed-priority fallback chain and the current
//! provider/model selection. Each chat call gets exactly one attempt per
//! provider, walked in chain order; a provider failure is absorbed by
//! moving on, never by flipping the provider's health flag (only explicit
//! health checks do that).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use vox_domain::error::{Error, Result};

use crate::traits::{ChatOutcome, ChatProvider, HistoryTurn, ModelInfo};

/// Provider families callers may ask about, registered or not. Status
/// reports carry an all-false entry for families that never initialized
/// so "not configured" is distinguishable from "configured but unhealthy".
const KNOWN_FAMILIES: &[&str] = &["openai", "claude", "xai", "lm_studio", "ollama"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Point-in-time status of one provider family.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub available: bool,
    pub current_model: Option<String>,
    pub healthy: bool,
    pub models: Vec<ModelInfo>,
}

impl ProviderStatus {
    fn unregistered() -> Self {
        Self {
            available: false,
            current_model: None,
            healthy: false,
            models: Vec::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The router's current provider/model default.
#[derive(Debug, Clone)]
struct Selection {
    provider: String,
    model: Option<String>,
}

/// Dispatches chat requests across providers with automatic failover.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
    fallback_chain: Vec<String>,
    current: RwLock<Option<Selection>>,
}

impl ProviderRouter {
    /// Build the router and elect the default provider: the first chain
    /// entry that is available, where the local class additionally needs
    /// at least one usable model. When none qualifies the router runs in
    /// no-provider mode and every chat call fails with
    /// [`Error::NoProviderAvailable`].
    pub fn new(
        providers: HashMap<String, Arc<dyn ChatProvider>>,
        fallback_chain: Vec<String>,
    ) -> Self {
        let current = elect_default(&providers, &fallback_chain);
        match &current {
            Some(sel) => tracing::info!(
                provider = %sel.provider,
                model = sel.model.as_deref().unwrap_or("-"),
                "default provider selected"
            ),
            None => tracing::warn!("no providers available"),
        }

        Self {
            providers,
            fallback_chain,
            current: RwLock::new(current),
        }
    }

    /// The currently selected default provider name.
    pub fn current_provider(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.provider.clone())
    }

    /// The currently selected default model.
    pub fn current_model(&self) -> Option<String> {
        self.current.read().as_ref().and_then(|s| s.model.clone())
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    // ── Chat dispatch ──────────────────────────────────────────────

    /// Send a chat message with automatic fallback.
    ///
    /// The requested (or current default) provider is attempted first with
    /// the requested model; on failure the fixed chain is walked in
    /// priority order — skipping the provider just attempted, names absent
    /// from the registry, and providers failing `is_available()` — each
    /// remaining candidate using its own current model. Every provider
    /// gets at most one attempt per call.
    pub async fn chat(
        &self,
        message: &str,
        history: &[HistoryTurn],
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<ChatOutcome> {
        let current = self.current.read().clone();
        let requested = provider
            .map(str::to_owned)
            .or_else(|| current.as_ref().map(|s| s.provider.clone()));
        let requested_model = model
            .map(str::to_owned)
            .or_else(|| current.as_ref().and_then(|s| s.model.clone()));

        let Some(requested) = requested else {
            return Err(Error::NoProviderAvailable);
        };

        // First attempt: the requested provider with the requested model.
        if let Some(adapter) = self.providers.get(&requested) {
            if adapter.is_available() {
                let model_used = requested_model.or_else(|| adapter.current_model());
                match self
                    .try_provider(adapter, message, history, model_used.as_deref())
                    .await
                {
                    Ok(text) => {
                        return Ok(ChatOutcome {
                            text,
                            provider: requested,
                            model: model_used.unwrap_or_default(),
                            fallback_used: false,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            provider = %requested,
                            error = %e,
                            "provider failed, trying fallback chain"
                        );
                    }
                }
            } else {
                tracing::warn!(
                    provider = %requested,
                    "requested provider unavailable, trying fallback chain"
                );
            }
        } else {
            tracing::warn!(
                provider = %requested,
                "requested provider not registered, trying fallback chain"
            );
        }

        // Fallback walk: each remaining chain entry with its own model.
        for name in &self.fallback_chain {
            if *name == requested {
                continue;
            }
            let Some(adapter) = self.providers.get(name) else {
                continue;
            };
            if !adapter.is_available() {
                continue;
            }

            let model_used = adapter.current_model();
            match self
                .try_provider(adapter, message, history, model_used.as_deref())
                .await
            {
                Ok(text) => {
                    tracing::info!(
                        from = %requested,
                        to = %name,
                        "fallback successful"
                    );
                    return Ok(ChatOutcome {
                        text,
                        provider: name.clone(),
                        model: model_used.unwrap_or_default(),
                        fallback_used: true,
                    });
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "fallback provider failed");
                }
            }
        }

        Err(Error::AllProvidersFailed)
    }

    /// One attempt against one adapter. An empty completion counts as a
    /// failure even if the adapter reported success.
    async fn try_provider(
        &self,
        adapter: &Arc<dyn ChatProvider>,
        message: &str,
        history: &[HistoryTurn],
        model: Option<&str>,
    ) -> Result<String> {
        let text = adapter.chat(message, history, model).await?;
        if text.trim().is_empty() {
            return Err(Error::Provider {
                provider: adapter.name().to_owned(),
                message: "empty response content".into(),
            });
        }
        Ok(text)
    }

    // ── Selection ──────────────────────────────────────────────────

    /// Make `name` the current provider, optionally selecting a model on
    /// it. Fails when the provider is unregistered or unavailable. An
    /// invalid model falls back to the adapter's own current model rather
    /// than failing the provider switch.
    pub fn set_provider(&self, name: &str, model: Option<&str>) -> bool {
        let Some(adapter) = self.providers.get(name) else {
            tracing::warn!(provider = %name, "cannot select unregistered provider");
            return false;
        };
        if !adapter.is_available() {
            tracing::warn!(provider = %name, "cannot select unavailable provider");
            return false;
        }

        let selected_model = match model {
            Some(m) if adapter.set_model(m) => Some(m.to_owned()),
            _ => adapter.current_model(),
        };

        *self.current.write() = Some(Selection {
            provider: name.to_owned(),
            model: selected_model.clone(),
        });
        tracing::info!(
            provider = %name,
            model = selected_model.as_deref().unwrap_or("-"),
            "current provider changed"
        );
        true
    }

    /// Select a model on the targeted (or current) provider. A rejection
    /// by the adapter propagates as `false` without mutating router state.
    pub fn set_model(&self, model: &str, provider: Option<&str>) -> bool {
        let target = provider
            .map(str::to_owned)
            .or_else(|| self.current_provider());
        let Some(target) = target else {
            tracing::warn!(model = %model, "no provider to set model on");
            return false;
        };
        let Some(adapter) = self.providers.get(&target) else {
            tracing::warn!(provider = %target, "cannot set model on unregistered provider");
            return false;
        };

        if !adapter.set_model(model) {
            return false;
        }

        let mut current = self.current.write();
        if let Some(sel) = current.as_mut() {
            if sel.provider == target {
                sel.model = Some(model.to_owned());
            }
        }
        true
    }

    // ── Introspection & health ─────────────────────────────────────

    /// Status of every known provider family, registered or not.
    pub fn status(&self) -> BTreeMap<String, ProviderStatus> {
        let mut status: BTreeMap<String, ProviderStatus> = self
            .providers
            .iter()
            .map(|(name, adapter)| {
                (
                    name.clone(),
                    ProviderStatus {
                        available: adapter.is_available(),
                        current_model: adapter.current_model(),
                        healthy: adapter.is_healthy(),
                        models: adapter.list_models(),
                    },
                )
            })
            .collect();

        for family in KNOWN_FAMILIES {
            status
                .entry((*family).to_owned())
                .or_insert_with(ProviderStatus::unregistered);
        }
        status
    }

    /// Run every adapter's health check concurrently. Each adapter's flag
    /// is updated independently; one failing check never affects another,
    /// and all checks run to completion.
    pub async fn health_check_all(&self) {
        let checks = self.providers.values().cloned().map(|adapter| async move {
            let healthy = adapter.health_check().await;
            tracing::info!(provider = %adapter.name(), healthy, "health check");
        });
        futures_util::future::join_all(checks).await;
    }
}

/// Pick the startup default: first chain entry that qualifies.
fn elect_default(
    providers: &HashMap<String, Arc<dyn ChatProvider>>,
    chain: &[String],
) -> Option<Selection> {
    for name in chain {
        let Some(adapter) = providers.get(name) else {
            continue;
        };
        // The local class is only a useful default when it actually has a
        // model to run; credentialed providers just need availability.
        let usable = if adapter.requires_credential() {
            adapter.is_available()
        } else {
            adapter.is_healthy() && adapter.current_model().is_some()
        };
        if usable {
            return Some(Selection {
                provider: name.clone(),
                model: adapter.current_model(),
            });
        }
    }
    None
}
