//! Provider registry construction.
//!
//! Builds the adapter set from configuration: resolves credentials,
//! instantiates the right adapter kind, and runs each adapter's startup
//! initialization. Adapters that fail to construct are logged and skipped
//! rather than aborting startup.

use std::collections::HashMap;
use std::sync::Arc;

use vox_domain::config::{ProviderKind, ProvidersConfig};

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::ChatProvider;
use crate::util::load_system_prompt;

/// Instantiate and initialize every configured provider.
///
/// Registration policy:
/// - A credentialed family without a resolvable credential is excluded
///   (logged, never an error).
/// - A credentialed adapter is registered even when its startup health
///   check fails — later periodic sweeps can promote it to healthy.
/// - The no-credential class (ollama) registers only when its startup
///   health check passes, since an unreachable daemon has nothing to
///   promote.
pub async fn build_providers(
    config: &ProvidersConfig,
) -> HashMap<String, Arc<dyn ChatProvider>> {
    let system_prompt = load_system_prompt(config.personality_file.as_deref());
    let timeout = config.request_timeout_secs;

    let mut providers: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();

    for pc in &config.entries {
        let credential = pc.auth.resolve();

        let adapter: Arc<dyn ChatProvider> = match (pc.kind, credential) {
            (ProviderKind::Ollama, _) => {
                match OllamaProvider::new(pc, system_prompt.clone(), timeout) {
                    Ok(p) => Arc::new(p),
                    Err(e) => {
                        tracing::warn!(provider = %pc.name, error = %e, "failed to construct adapter, skipping");
                        continue;
                    }
                }
            }
            (ProviderKind::OpenaiCompat, Some(key)) => {
                match OpenAiCompatProvider::new(pc, key, system_prompt.clone(), timeout) {
                    Ok(p) => Arc::new(p),
                    Err(e) => {
                        tracing::warn!(provider = %pc.name, error = %e, "failed to construct adapter, skipping");
                        continue;
                    }
                }
            }
            (ProviderKind::Anthropic, Some(key)) => {
                match AnthropicProvider::new(pc, key, system_prompt.clone(), timeout) {
                    Ok(p) => Arc::new(p),
                    Err(e) => {
                        tracing::warn!(provider = %pc.name, error = %e, "failed to construct adapter, skipping");
                        continue;
                    }
                }
            }
            (_, None) => {
                tracing::info!(provider = %pc.name, "no credential configured, skipping");
                continue;
            }
        };

        adapter.initialize().await;

        if !adapter.requires_credential() && !adapter.is_healthy() {
            tracing::warn!(
                provider = %pc.name,
                "local provider unreachable at startup, not registering"
            );
            continue;
        }

        tracing::info!(
            provider = %pc.name,
            kind = ?pc.kind,
            healthy = adapter.is_healthy(),
            "registered LLM provider"
        );
        providers.insert(pc.name.clone(), adapter);
    }

    if providers.is_empty() && !config.entries.is_empty() {
        tracing::warn!(
            "no LLM providers registered; chat requests will fail until credentials \
             are configured or a local daemon is reachable"
        );
    }

    providers
}
