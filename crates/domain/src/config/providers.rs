use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Fixed priority order in which providers are tried on fallback.
    #[serde(default = "d_fallback_chain")]
    pub fallback_chain: Vec<String>,
    /// Registered LLM providers (data-driven: adding a provider = adding config).
    #[serde(default = "d_entries", rename = "entries")]
    pub entries: Vec<ProviderConfig>,
    /// Interval between periodic health sweeps, in seconds.
    #[serde(default = "d_300")]
    pub health_sweep_secs: u64,
    /// Per-request timeout applied by each adapter's HTTP client, in seconds.
    #[serde(default = "d_120")]
    pub request_timeout_secs: u64,
    /// Path to a file holding the system prompt shared by all adapters.
    /// When absent or unreadable, a built-in default prompt is used.
    #[serde(default)]
    pub personality_file: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            fallback_chain: d_fallback_chain(),
            entries: d_entries(),
            health_sweep_secs: 300,
            request_timeout_secs: 120,
            personality_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider name, referenced by the fallback chain and by
    /// clients (e.g. "openai", "claude", "ollama").
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI and any endpoint speaking the chat-completions contract
    /// (xAI, LM Studio, ...).
    OpenaiCompat,
    /// Anthropic messages API.
    Anthropic,
    /// Local Ollama daemon; requires no credential.
    Ollama,
}

impl ProviderKind {
    /// Whether adapters of this kind need a credential to operate.
    pub fn requires_credential(self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Env var containing the API key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env).
    #[serde(default)]
    pub key: Option<String>,
}

impl AuthConfig {
    /// Resolve the credential: inline key first, then the environment.
    /// `None` means the provider family is excluded from registration.
    pub fn resolve(&self) -> Option<String> {
        if let Some(key) = self.key.as_deref().filter(|k| !k.is_empty()) {
            return Some(key.to_owned());
        }
        self.env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_fallback_chain() -> Vec<String> {
    vec!["openai".into(), "claude".into(), "ollama".into()]
}

fn d_entries() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "openai".into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.openai.com/v1".into(),
            auth: AuthConfig {
                env: Some("OPENAI_API_KEY".into()),
                key: None,
            },
            default_model: Some("gpt-4o".into()),
        },
        ProviderConfig {
            name: "claude".into(),
            kind: ProviderKind::Anthropic,
            base_url: "https://api.anthropic.com".into(),
            auth: AuthConfig {
                env: Some("ANTHROPIC_API_KEY".into()),
                key: None,
            },
            default_model: Some("claude-3-5-sonnet-20241022".into()),
        },
        ProviderConfig {
            name: "ollama".into(),
            kind: ProviderKind::Ollama,
            base_url: "http://localhost:11434".into(),
            auth: AuthConfig::default(),
            default_model: None,
        },
    ]
}

fn d_300() -> u64 {
    300
}
fn d_120() -> u64 {
    120
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
