//! Anthropic-native adapter.
//!
//! Speaks the Anthropic Messages API: `x-api-key` auth, a pinned
//! `anthropic-version`, and the system prompt as a top-level field rather
//! than a message.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use vox_domain::config::ProviderConfig;
use vox_domain::error::{Error, Result};

use crate::traits::{ChatProvider, CostTier, HistoryTurn, ModelInfo};
use crate::util::{from_reqwest, history_to_messages};

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    system_prompt: String,
    models: RwLock<Vec<ModelInfo>>,
    current_model: RwLock<Option<String>>,
    healthy: AtomicBool,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(
        cfg: &ProviderConfig,
        api_key: String,
        system_prompt: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            name: cfg.name.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            system_prompt,
            models: RwLock::new(claude_models()),
            current_model: RwLock::new(None),
            healthy: AtomicBool::new(false),
            client,
        })
    }

    async fn message(
        &self,
        message: &str,
        history: &[HistoryTurn],
        model: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let mut messages = history_to_messages(history);
        messages.push(serde_json::json!({"role": "user", "content": message}));

        let body = serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages,
            "system": self.system_prompt,
        });

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.name.clone(),
                message: format!("HTTP {status}: {text}"),
            });
        }

        let json: Value = response.json().await.map_err(from_reqwest)?;
        let content = json["content"][0]["text"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_owned();

        if content.is_empty() {
            return Err(Error::Provider {
                provider: self.name.clone(),
                message: "empty response content".into(),
            });
        }
        Ok(content)
    }
}

#[async_trait::async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) {
        {
            let models = self.models.read();
            let default = models
                .iter()
                .find(|m| m.available)
                .map(|m| m.id.clone());
            *self.current_model.write() = default;
        }
        let healthy = self.health_check().await;
        if healthy {
            tracing::info!(provider = %self.name, "provider initialized");
        } else {
            tracing::warn!(provider = %self.name, "provider startup health check failed");
        }
    }

    async fn chat(
        &self,
        message: &str,
        history: &[HistoryTurn],
        model: Option<&str>,
    ) -> Result<String> {
        let model = model
            .map(str::to_owned)
            .or_else(|| self.current_model())
            .unwrap_or_else(|| "claude-3-5-sonnet-20241022".into());
        self.message(message, history, &model, 1000).await
    }

    async fn health_check(&self) -> bool {
        let model = self
            .current_model()
            .unwrap_or_else(|| "claude-3-haiku-20240307".into());
        let healthy = self.message("Hello", &[], &model, 10).await.is_ok();
        self.healthy.store(healthy, Ordering::SeqCst);
        healthy
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        self.models.read().clone()
    }

    fn set_model(&self, model: &str) -> bool {
        let known = self
            .models
            .read()
            .iter()
            .any(|m| m.id == model && m.available);
        if known {
            *self.current_model.write() = Some(model.to_owned());
            tracing::info!(provider = %self.name, model = %model, "model selected");
        } else {
            tracing::warn!(provider = %self.name, model = %model, "model not available");
        }
        known
    }

    fn current_model(&self) -> Option<String> {
        self.current_model.read().clone()
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn claude_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "claude-3-5-sonnet-20241022".into(),
            name: "Claude 3.5 Sonnet".into(),
            available: true,
            cost_tier: CostTier::High,
        },
        ModelInfo {
            id: "claude-3-haiku-20240307".into(),
            name: "Claude 3 Haiku".into(),
            available: true,
            cost_tier: CostTier::Low,
        },
        // Limited availability.
        ModelInfo {
            id: "claude-3-opus-20240229".into(),
            name: "Claude 3 Opus".into(),
            available: false,
            cost_tier: CostTier::High,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_domain::config::{AuthConfig, ProviderKind};

    fn provider() -> AnthropicProvider {
        let cfg = ProviderConfig {
            name: "claude".into(),
            kind: ProviderKind::Anthropic,
            base_url: "https://api.anthropic.com".into(),
            auth: AuthConfig::default(),
            default_model: None,
        };
        AnthropicProvider::new(&cfg, "sk-test".into(), "prompt".into(), 5).unwrap()
    }

    #[test]
    fn set_model_rejects_unavailable_entries() {
        let p = provider();
        assert!(p.set_model("claude-3-haiku-20240307"));
        assert_eq!(p.current_model().as_deref(), Some("claude-3-haiku-20240307"));

        // Opus is catalogued but flagged unavailable.
        assert!(!p.set_model("claude-3-opus-20240229"));
        assert!(!p.set_model("claude-9000"));
        // Selection unchanged after rejections.
        assert_eq!(p.current_model().as_deref(), Some("claude-3-haiku-20240307"));
    }

    #[test]
    fn availability_requires_health() {
        let p = provider();
        assert!(p.has_credential());
        assert!(!p.is_healthy());
        assert!(!p.is_available());
    }
}
