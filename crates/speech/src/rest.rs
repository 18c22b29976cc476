//! HTTP implementation of [`SpeechProcessor`].
//!
//! Talks to an external speech service exposing `/v1/transcribe` and
//! `/v1/synthesize`. Audio travels base64-encoded in JSON bodies. Every
//! failure is folded into the result structs — callers never see an
//! `Err` from this collaborator.

use base64::Engine as _;
use serde::Deserialize;

use vox_domain::config::SpeechConfig;
use vox_domain::error::{Error, Result};

use crate::{SpeechProcessor, SynthesisResult, TranscriptionResult};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for the speech service. Created once and reused; the
/// underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct HttpSpeechClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSpeechClient {
    pub fn new(cfg: &SpeechConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Wire shape of the synthesis endpoint's response.
#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    audio_data: String,
    #[serde(default = "d_wav")]
    format: String,
    #[serde(default)]
    duration: f32,
    #[serde(default)]
    error: Option<String>,
}

fn d_wav() -> String {
    "wav".into()
}

#[async_trait::async_trait]
impl SpeechProcessor for HttpSpeechClient {
    async fn transcribe(&self, audio: &[u8], source_format: &str) -> TranscriptionResult {
        let body = serde_json::json!({
            "audio_data": B64.encode(audio),
            "format": source_format,
        });

        let response = match self
            .http
            .post(self.url("/v1/transcribe"))
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "transcription request failed");
                return TranscriptionResult::failed(format!("transcription request failed: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "transcription service error");
            return TranscriptionResult::failed(format!("transcription service HTTP {status}"));
        }

        match response.json::<TranscriptionResult>().await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "transcription response unparseable");
                TranscriptionResult::failed(format!("transcription response unparseable: {e}"))
            }
        }
    }

    async fn synthesize(&self, text: &str) -> SynthesisResult {
        if text.trim().is_empty() {
            return SynthesisResult::failed("empty text");
        }

        let body = serde_json::json!({ "text": text });
        let response = match self
            .http
            .post(self.url("/v1/synthesize"))
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "synthesis request failed");
                return SynthesisResult::failed(format!("synthesis request failed: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "synthesis service error");
            return SynthesisResult::failed(format!("synthesis service HTTP {status}"));
        }

        let wire = match response.json::<SynthesizeResponse>().await {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(error = %e, "synthesis response unparseable");
                return SynthesisResult::failed(format!("synthesis response unparseable: {e}"));
            }
        };

        let audio_data = match B64.decode(&wire.audio_data) {
            Ok(bytes) => bytes,
            Err(e) => {
                return SynthesisResult::failed(format!("synthesis audio undecodable: {e}"));
            }
        };

        SynthesisResult {
            success: wire.success && !audio_data.is_empty(),
            audio_data,
            format: wire.format,
            duration: wire.duration,
            error: wire.error,
        }
    }
}
