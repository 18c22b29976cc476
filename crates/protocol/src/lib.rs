//! Relay protocol: the tagged JSON envelopes exchanged over a session's
//! WebSocket, plus close codes and the inbound parse helper.
//!
//! Every message has a string `type` tag. Server envelopes additionally
//! carry a `timestamp` field holding the owning session's last-activity
//! time (RFC 3339).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Close code sent when a connection names a session id the store does
/// not know.
pub const CLOSE_INVALID_SESSION: u16 = 4004;

/// Close code for an uncaught failure in the connection loop.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client → server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Inbound message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEnvelope {
    /// Heartbeat.
    #[serde(rename = "ping")]
    Ping,

    /// Set the session's preferred provider (and optionally model) for
    /// subsequent chat turns. Does not touch the router's default.
    #[serde(rename = "change_provider")]
    ChangeProvider {
        provider: String,
        #[serde(default)]
        model: Option<String>,
    },

    /// Set the session's preferred model (and optionally provider).
    #[serde(rename = "change_model")]
    ChangeModel {
        model: String,
        #[serde(default)]
        provider: Option<String>,
    },

    /// A text chat turn.
    #[serde(rename = "text_input")]
    TextInput { text: String },

    /// A recorded audio clip, base64-encoded.
    #[serde(rename = "audio_data")]
    AudioData {
        #[serde(default)]
        data: String,
        #[serde(default = "d_wav")]
        format: String,
    },

    /// System status query, relayed to the monitoring collaborator.
    #[serde(rename = "system_status_query")]
    SystemStatusQuery {
        #[serde(default = "d_current")]
        query_type: String,
        #[serde(default = "d_10")]
        timeframe_minutes: u32,
    },

    /// Capability question, relayed to the monitoring collaborator.
    #[serde(rename = "self_awareness_query")]
    SelfAwarenessQuery {
        #[serde(default)]
        question: String,
        #[serde(default)]
        context: serde_json::Value,
    },

    /// Log/error analysis request, relayed to the monitoring collaborator.
    #[serde(rename = "error_analysis_request")]
    ErrorAnalysisRequest,
}

fn d_wav() -> String {
    "wav".into()
}
fn d_current() -> String {
    "current".into()
}
fn d_10() -> u32 {
    10
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server → client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outbound message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEnvelope {
    /// First envelope after a successful bind.
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        session_id: String,
        created_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// Heartbeat response.
    #[serde(rename = "pong")]
    Pong { timestamp: DateTime<Utc> },

    /// Echo of a `change_provider` request.
    #[serde(rename = "provider_changed")]
    ProviderChanged {
        provider: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Echo of a `change_model` request.
    #[serde(rename = "model_changed")]
    ModelChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// Transcription result for an `audio_data` message. Always emitted,
    /// even when transcription failed or was too low-confidence to chat.
    #[serde(rename = "transcription")]
    Transcription {
        text: String,
        confidence: f32,
        language: String,
        duration: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A completed chat turn.
    #[serde(rename = "response")]
    Response {
        text: String,
        provider: String,
        model: String,
        fallback_used: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Synthesized audio for the preceding `response`, base64-encoded.
    #[serde(rename = "audio_response")]
    AudioResponse {
        audio_data: String,
        audio_format: String,
        duration: f32,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Structured status relayed from the monitoring collaborator.
    #[serde(rename = "system_status_response")]
    SystemStatusResponse {
        #[serde(flatten)]
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// Structured capability answer relayed from the monitoring collaborator.
    #[serde(rename = "self_awareness_response")]
    SelfAwarenessResponse {
        #[serde(flatten)]
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// Structured log analysis relayed from the monitoring collaborator.
    #[serde(rename = "error_analysis_response")]
    ErrorAnalysisResponse {
        #[serde(flatten)]
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// Unsolicited alert pushed to every connected session when the
    /// monitoring collaborator flags a problem.
    #[serde(rename = "proactive_alert")]
    ProactiveAlert {
        #[serde(flatten)]
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// A message-scoped error. The connection stays open.
    #[serde(rename = "error")]
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why an inbound frame could not be turned into a [`ClientEnvelope`].
///
/// The two cases get different error envelopes: an unknown `type` is
/// reported by name, while malformed JSON gets a generic message. Neither
/// closes the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Valid JSON with a `type` tag we do not recognize.
    UnknownType(String),
    /// Not valid JSON, no `type` tag, or fields of the wrong shape.
    Malformed(String),
}

const KNOWN_TYPES: &[&str] = &[
    "ping",
    "change_provider",
    "change_model",
    "text_input",
    "audio_data",
    "system_status_query",
    "self_awareness_query",
    "error_analysis_request",
];

/// Parse one inbound text frame.
///
/// serde's internally-tagged enums conflate "unknown tag" with any other
/// deserialization error, so the `type` field is inspected first to keep
/// the two failure modes distinct.
pub fn parse_client_envelope(raw: &str) -> Result<ClientEnvelope, ParseFailure> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ParseFailure::Malformed(format!("invalid JSON: {e}")))?;

    let kind = match value.get("type").and_then(|t| t.as_str()) {
        Some(k) => k.to_owned(),
        None => return Err(ParseFailure::Malformed("missing 'type' field".into())),
    };

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(ParseFailure::UnknownType(kind));
    }

    serde_json::from_value(value)
        .map_err(|e| ParseFailure::Malformed(format!("invalid '{kind}' message: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_input() {
        let env = parse_client_envelope(r#"{"type":"text_input","text":"hello"}"#).unwrap();
        match env {
            ClientEnvelope::TextInput { text } => assert_eq!(text, "hello"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn parses_ping_without_extra_fields() {
        let env = parse_client_envelope(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(env, ClientEnvelope::Ping));
    }

    #[test]
    fn audio_data_defaults_format_to_wav() {
        let env = parse_client_envelope(r#"{"type":"audio_data","data":"AAAA"}"#).unwrap();
        match env {
            ClientEnvelope::AudioData { data, format } => {
                assert_eq!(data, "AAAA");
                assert_eq!(format, "wav");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_reported_by_name() {
        let err = parse_client_envelope(r#"{"type":"telepathy","thought":"hi"}"#).unwrap_err();
        assert_eq!(err, ParseFailure::UnknownType("telepathy".into()));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_client_envelope("{not json").unwrap_err();
        assert!(matches!(err, ParseFailure::Malformed(_)));
    }

    #[test]
    fn missing_type_is_malformed() {
        let err = parse_client_envelope(r#"{"text":"hello"}"#).unwrap_err();
        assert!(matches!(err, ParseFailure::Malformed(_)));
    }

    #[test]
    fn known_type_with_wrong_fields_is_malformed_not_unknown() {
        let err = parse_client_envelope(r#"{"type":"change_provider"}"#).unwrap_err();
        assert!(matches!(err, ParseFailure::Malformed(_)));
    }

    #[test]
    fn server_envelope_serializes_with_type_tag() {
        let env = ServerEnvelope::Pong {
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "pong");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn monitoring_payload_flattens_into_envelope() {
        let env = ServerEnvelope::SystemStatusResponse {
            payload: serde_json::json!({"status": "healthy", "metrics": {"cpu": 12}}),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "system_status_response");
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["metrics"]["cpu"], 12);
    }

    #[test]
    fn response_omits_absent_source() {
        let env = ServerEnvelope::Response {
            text: "hi".into(),
            provider: "openai".into(),
            model: "gpt-4o".into(),
            fallback_used: false,
            source: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("source").is_none());
    }
}
