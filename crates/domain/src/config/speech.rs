use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Speech collaborator (ASR + TTS)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// When false, transcription returns empty results and synthesis is
    /// skipped; chat over text still works.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the speech service exposing `/v1/transcribe` and
    /// `/v1/synthesize`.
    #[serde(default = "d_speech_url")]
    pub base_url: String,
    /// Per-request timeout, in seconds. Transcription of long clips can
    /// take a while, so this is generous.
    #[serde(default = "d_60")]
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: d_speech_url(),
            timeout_secs: 60,
        }
    }
}

fn d_speech_url() -> String {
    "http://localhost:9010".into()
}
fn d_60() -> u64 {
    60
}
