//! LLM provider adapters and the fallback router.
//!
//! Each backend (OpenAI-compatible, Anthropic, Ollama) is wrapped in an
//! adapter implementing [`traits::ChatProvider`]. The [`registry`] builds
//! adapters from config, and the [`router::ProviderRouter`] dispatches chat
//! requests across them along a fixed-priority fallback chain.

pub mod anthropic;
pub mod ollama;
pub mod openai_compat;
pub mod registry;
pub mod router;
pub mod traits;
pub mod util;

pub use router::{ProviderRouter, ProviderStatus};
pub use traits::{ChatOutcome, ChatProvider, CostTier, HistoryTurn, ModelInfo};
