//! OpenAI-compatible adapter.
//!
//! Works with OpenAI and any other endpoint that follows the OpenAI chat
//! completions contract (xAI, LM Studio, vLLM, ...).

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use vox_domain::config::ProviderConfig;
use vox_domain::error::{Error, Result};

use crate::traits::{ChatProvider, CostTier, HistoryTurn, ModelInfo};
use crate::util::{from_reqwest, history_to_messages};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    system_prompt: String,
    models: RwLock<Vec<ModelInfo>>,
    current_model: RwLock<Option<String>>,
    healthy: AtomicBool,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new adapter from the deserialized provider config and a
    /// resolved credential.
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
            models: RwLock::new(seed_models(&cfg.name, cfg.default_model.as_deref())),
            current_model: RwLock::new(None),
            healthy: AtomicBool::new(false),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    async fn completion(
        &self,
        message: &str,
        history: &[HistoryTurn],
        model: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let mut messages =
            vec![serde_json::json!({"role": "system", "content": self.system_prompt})];
        messages.extend(history_to_messages(history));
        messages.push(serde_json::json!({"role": "user", "content": message}));

        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": 0.7,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .authed_post(&url)
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
        let content = json["choices"][0]["message"]["content"]
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
impl ChatProvider for OpenAiCompatProvider {
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
            .unwrap_or_else(|| "gpt-4o".into());
        self.completion(message, history, &model, 1000).await
    }

    async fn health_check(&self) -> bool {
        let model = self
            .current_model()
            .unwrap_or_else(|| "gpt-3.5-turbo".into());
        let healthy = self.completion("Hello", &[], &model, 10).await.is_ok();
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

/// Seed the model catalog. The stock OpenAI entry carries the built-in
/// catalog; other compat endpoints (xAI, LM Studio) advertise only their
/// configured default model.
fn seed_models(name: &str, default_model: Option<&str>) -> Vec<ModelInfo> {
    if name == "openai" {
        return vec![
            ModelInfo {
                id: "gpt-4o".into(),
                name: "GPT-4o".into(),
                available: true,
                cost_tier: CostTier::High,
            },
            ModelInfo {
                id: "gpt-3.5-turbo".into(),
                name: "GPT-3.5 Turbo".into(),
                available: true,
                cost_tier: CostTier::Low,
            },
            // Requires special access.
            ModelInfo {
                id: "o3-mini".into(),
                name: "o3-mini".into(),
                available: false,
                cost_tier: CostTier::Medium,
            },
        ];
    }

    default_model
        .map(|id| {
            vec![ModelInfo {
                id: id.to_owned(),
                name: id.to_owned(),
                available: true,
                cost_tier: CostTier::Medium,
            }]
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_openai_catalog_has_three_entries() {
        let models = seed_models("openai", Some("gpt-4o"));
        assert_eq!(models.len(), 3);
        assert!(models.iter().any(|m| m.id == "o3-mini" && !m.available));
    }

    #[test]
    fn compat_endpoint_catalog_uses_default_model() {
        let models = seed_models("lm_studio", Some("qwen2.5-7b-instruct"));
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "qwen2.5-7b-instruct");
        assert!(models[0].available);
    }

    #[test]
    fn compat_endpoint_without_default_has_empty_catalog() {
        assert!(seed_models("xai", None).is_empty());
    }
}
