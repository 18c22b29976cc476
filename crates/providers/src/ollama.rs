//! Ollama local adapter.
//!
//! Talks to a local Ollama daemon over `/api/generate` and `/api/tags`.
//! No credential is required; the model catalog is whatever the daemon
//! has pulled, fetched once at initialization.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use vox_domain::config::ProviderConfig;
use vox_domain::error::{Error, Result};

use crate::traits::{ChatProvider, CostTier, HistoryTurn, ModelInfo};
use crate::util::from_reqwest;

/// Model names preferred as the default, most specific first.
const PREFERRED_MODELS: &[&str] = &["llama3.1:8b", "llama3.1:latest", "llama3.1", "llama3"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for a local Ollama daemon.
pub struct OllamaProvider {
    name: String,
    base_url: String,
    system_prompt: String,
    models: RwLock<Vec<ModelInfo>>,
    current_model: RwLock<Option<String>>,
    healthy: AtomicBool,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(cfg: &ProviderConfig, system_prompt: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            name: cfg.name.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            system_prompt,
            models: RwLock::new(Vec::new()),
            current_model: RwLock::new(None),
            healthy: AtomicBool::new(false),
            client,
        })
    }

    /// Ollama's generate endpoint takes one flattened prompt rather than
    /// role-structured messages.
    fn build_prompt(&self, message: &str, history: &[HistoryTurn]) -> String {
        let mut prompt = format!("System: {}\n\n", self.system_prompt);
        for turn in history {
            prompt.push_str(&format!(
                "User: {}\nAssistant: {}\n",
                turn.user, turn.assistant
            ));
        }
        prompt.push_str(&format!("User: {message}\nAssistant:"));
        prompt
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.7,
                "top_p": 0.9,
            },
        });

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.name.clone(),
                message: format!("HTTP {status}"),
            });
        }

        let json: Value = response.json().await.map_err(from_reqwest)?;
        let content = json["response"].as_str().unwrap_or("").trim().to_owned();
        if content.is_empty() {
            return Err(Error::Provider {
                provider: self.name.clone(),
                message: "empty response content".into(),
            });
        }
        Ok(content)
    }

    async fn fetch_models(&self) -> Vec<ModelInfo> {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(provider = %self.name, status = %r.status(), "model listing failed");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(provider = %self.name, error = %e, "model listing failed");
                return Vec::new();
            }
        };

        let json: Value = match response.json().await {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(provider = %self.name, error = %e, "model listing unparseable");
                return Vec::new();
            }
        };

        json["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str())
                    .map(|name| ModelInfo {
                        id: name.to_owned(),
                        name: name.to_owned(),
                        available: true,
                        cost_tier: CostTier::Free,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) {
        let fetched = self.fetch_models().await;
        let default = pick_default_model(&fetched);
        {
            *self.models.write() = fetched;
            *self.current_model.write() = default;
        }

        let healthy = self.health_check().await;
        if healthy {
            tracing::info!(
                provider = %self.name,
                models = self.models.read().len(),
                "provider initialized"
            );
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
            .unwrap_or_else(|| "llama3.1:8b".into());
        let prompt = self.build_prompt(message, history);
        self.generate(&prompt, &model).await
    }

    async fn health_check(&self) -> bool {
        // The daemon must answer the tags endpoint; when a model is
        // selected it must also complete a tiny generation.
        let url = format!("{}/api/tags", self.base_url);
        let daemon_up = matches!(
            self.client.get(&url).send().await,
            Ok(r) if r.status().is_success()
        );

        let healthy = if !daemon_up {
            false
        } else if let Some(model) = self.current_model() {
            self.generate("Hello", &model).await.is_ok()
        } else {
            true
        };

        self.healthy.store(healthy, Ordering::SeqCst);
        healthy
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        self.models.read().clone()
    }

    /// Any model name is accepted; validation happens at call time when
    /// the daemon rejects names it does not have.
    fn set_model(&self, model: &str) -> bool {
        *self.current_model.write() = Some(model.to_owned());
        tracing::info!(provider = %self.name, model = %model, "model selected");
        true
    }

    fn current_model(&self) -> Option<String> {
        self.current_model.read().clone()
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn requires_credential(&self) -> bool {
        false
    }

    fn has_credential(&self) -> bool {
        true
    }
}

/// Pick the default model: a preferred llama variant when present, else
/// the first catalog entry.
fn pick_default_model(models: &[ModelInfo]) -> Option<String> {
    for preferred in PREFERRED_MODELS {
        if let Some(model) = models.iter().find(|m| m.id.contains(preferred)) {
            return Some(model.id.clone());
        }
    }
    models.first().map(|m| m.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> ModelInfo {
        ModelInfo {
            id: id.into(),
            name: id.into(),
            available: true,
            cost_tier: CostTier::Free,
        }
    }

    #[test]
    fn default_model_prefers_llama31() {
        let models = vec![model("mistral:7b"), model("llama3.1:8b"), model("phi3")];
        assert_eq!(pick_default_model(&models).as_deref(), Some("llama3.1:8b"));
    }

    #[test]
    fn default_model_falls_back_to_first() {
        let models = vec![model("mistral:7b"), model("phi3")];
        assert_eq!(pick_default_model(&models).as_deref(), Some("mistral:7b"));
    }

    #[test]
    fn default_model_none_when_empty() {
        assert!(pick_default_model(&[]).is_none());
    }

    #[test]
    fn prompt_flattens_history() {
        let cfg = vox_domain::config::ProviderConfig {
            name: "ollama".into(),
            kind: vox_domain::config::ProviderKind::Ollama,
            base_url: "http://localhost:11434".into(),
            auth: Default::default(),
            default_model: None,
        };
        let p = OllamaProvider::new(&cfg, "Be brief.".into(), 5).unwrap();
        let history = vec![HistoryTurn {
            user: "hi".into(),
            assistant: "hello".into(),
        }];
        let prompt = p.build_prompt("how are you?", &history);
        assert!(prompt.starts_with("System: Be brief."));
        assert!(prompt.contains("User: hi\nAssistant: hello\n"));
        assert!(prompt.ends_with("User: how are you?\nAssistant:"));
    }
}
