//! `vox-speech` — speech collaborator client for VoxRelay.
//!
//! Provides the [`SpeechProcessor`] trait abstracting speech-to-text and
//! text-to-speech, an HTTP implementation ([`HttpSpeechClient`]) talking
//! to an external speech service, and a [`DisabledSpeech`] stub that
//! degrades gracefully when no service is configured.
//!
//! Collaborator failures never abort the owning chat turn: transcription
//! errors surface inside [`TranscriptionResult`], synthesis errors inside
//! [`SynthesisResult`].

pub mod rest;

pub use rest::HttpSpeechClient;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vox_domain::config::SpeechConfig;
use vox_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Contract types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of transcribing one audio clip.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TranscriptionResult {
    pub text: String,
    /// Confidence on a 0–100 scale.
    pub confidence: f32,
    #[serde(default = "d_unknown")]
    pub language: String,
    /// Clip duration in seconds.
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranscriptionResult {
    /// An empty result carrying an error note.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            language: "unknown".into(),
            duration: 0.0,
            error: Some(error.into()),
        }
    }
}

fn d_unknown() -> String {
    "unknown".into()
}

/// Result of synthesizing speech for one response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SynthesisResult {
    pub success: bool,
    /// Raw audio bytes; empty on failure.
    #[serde(default)]
    pub audio_data: Vec<u8>,
    #[serde(default = "d_wav")]
    pub format: String,
    /// Audio duration in seconds.
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub error: Option<String>,
}

impl SynthesisResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            audio_data: Vec::new(),
            format: "wav".into(),
            duration: 0.0,
            error: Some(error.into()),
        }
    }
}

fn d_wav() -> String {
    "wav".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Abstraction over the speech service (ASR + TTS).
#[async_trait::async_trait]
pub trait SpeechProcessor: Send + Sync {
    /// Transcribe raw audio bytes to text.
    async fn transcribe(&self, audio: &[u8], source_format: &str) -> TranscriptionResult;

    /// Synthesize speech for a response.
    async fn synthesize(&self, text: &str) -> SynthesisResult;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Disabled stub
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Used when the speech service is disabled in config. Text chat works;
/// audio messages get empty transcriptions and no audio responses.
pub struct DisabledSpeech;

#[async_trait::async_trait]
impl SpeechProcessor for DisabledSpeech {
    async fn transcribe(&self, _audio: &[u8], _source_format: &str) -> TranscriptionResult {
        TranscriptionResult::failed("speech service disabled")
    }

    async fn synthesize(&self, _text: &str) -> SynthesisResult {
        SynthesisResult::failed("speech service disabled")
    }
}

/// Create the speech processor matching the config.
pub fn create_processor(cfg: &SpeechConfig) -> Result<Arc<dyn SpeechProcessor>> {
    if !cfg.enabled {
        tracing::info!("speech service disabled; audio messages degrade to text-only");
        return Ok(Arc::new(DisabledSpeech));
    }
    let client = HttpSpeechClient::new(cfg)?;
    tracing::info!(url = %cfg.base_url, "speech client ready");
    Ok(Arc::new(client))
}
