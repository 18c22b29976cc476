//! Per-message dispatch: parses inbound envelopes, routes them to their
//! handlers, and emits the resulting envelopes through the session's
//! outbound channel.
//!
//! Failure discipline: an unknown type or malformed frame yields one
//! `error` envelope; a handler failure is caught and surfaced the same
//! way. The connection loop only ends on transport events or when even
//! the error envelope cannot be delivered.

use base64::Engine as _;
use chrono::{DateTime, Utc};

use vox_domain::error::{Error, Result};
use vox_protocol::{parse_client_envelope, ClientEnvelope, ParseFailure, ServerEnvelope};
use vox_providers::HistoryTurn;
use vox_sessions::{ConnectionSink, ConversationTurn, OutboundFrame};

use crate::state::AppState;

/// Transcriptions at or below this confidence (0–100) are reported but
/// never forwarded to the router.
pub const CONFIDENCE_THRESHOLD: f32 = 30.0;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// What the reader loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    /// The failure could not be reported to the client.
    Fatal,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Frame processing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process one inbound text frame end to end.
pub async fn process_frame(
    state: &AppState,
    session_id: &str,
    sink: &ConnectionSink,
    raw: &str,
) -> FrameOutcome {
    let envelope = match parse_client_envelope(raw) {
        Ok(envelope) => envelope,
        Err(ParseFailure::UnknownType(kind)) => {
            tracing::warn!(session_id = %session_id, kind = %kind, "unknown message type");
            let delivered = send_error(
                state,
                session_id,
                sink,
                format!("Unknown message type: {kind}"),
            )
            .await;
            return if delivered {
                FrameOutcome::Continue
            } else {
                FrameOutcome::Fatal
            };
        }
        Err(ParseFailure::Malformed(detail)) => {
            tracing::warn!(session_id = %session_id, detail = %detail, "malformed message");
            let delivered = send_error(state, session_id, sink, detail).await;
            return if delivered {
                FrameOutcome::Continue
            } else {
                FrameOutcome::Fatal
            };
        }
    };

    // Every recognized inbound envelope counts as activity.
    state.sessions.touch(session_id);

    let kind = envelope_kind(&envelope);
    if let Err(e) = handle_envelope(state, session_id, sink, envelope).await {
        tracing::error!(
            session_id = %session_id,
            kind = %kind,
            error = %e,
            "message handler failed"
        );
        let delivered =
            send_error(state, session_id, sink, format!("Error processing {kind}")).await;
        if !delivered {
            return FrameOutcome::Fatal;
        }
    }
    FrameOutcome::Continue
}

fn envelope_kind(envelope: &ClientEnvelope) -> &'static str {
    match envelope {
        ClientEnvelope::Ping => "ping",
        ClientEnvelope::ChangeProvider { .. } => "change_provider",
        ClientEnvelope::ChangeModel { .. } => "change_model",
        ClientEnvelope::TextInput { .. } => "text_input",
        ClientEnvelope::AudioData { .. } => "audio_data",
        ClientEnvelope::SystemStatusQuery { .. } => "system_status_query",
        ClientEnvelope::SelfAwarenessQuery { .. } => "self_awareness_query",
        ClientEnvelope::ErrorAnalysisRequest => "error_analysis_request",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_envelope(
    state: &AppState,
    session_id: &str,
    sink: &ConnectionSink,
    envelope: ClientEnvelope,
) -> Result<()> {
    match envelope {
        ClientEnvelope::Ping => {
            send(
                sink,
                ServerEnvelope::Pong {
                    timestamp: stamp(state, session_id),
                },
            )
            .await;
            Ok(())
        }

        ClientEnvelope::ChangeProvider { provider, model } => {
            // Only the session's preference changes here; the router is
            // consulted on the next chat turn.
            state
                .sessions
                .set_preference(session_id, Some(provider.clone()), model.clone());
            send(
                sink,
                ServerEnvelope::ProviderChanged {
                    provider,
                    model,
                    timestamp: stamp(state, session_id),
                },
            )
            .await;
            Ok(())
        }

        ClientEnvelope::ChangeModel { model, provider } => {
            let existing = state
                .sessions
                .get(session_id)
                .and_then(|s| s.provider);
            let provider = provider.or(existing);
            state.sessions.set_preference(
                session_id,
                provider.clone(),
                Some(model.clone()),
            );
            send(
                sink,
                ServerEnvelope::ModelChanged {
                    provider,
                    model,
                    timestamp: stamp(state, session_id),
                },
            )
            .await;
            Ok(())
        }

        ClientEnvelope::TextInput { text } => {
            handle_chat_turn(state, session_id, sink, &text, None).await
        }

        ClientEnvelope::AudioData { data, format } => {
            handle_audio_data(state, session_id, sink, &data, &format).await
        }

        ClientEnvelope::SystemStatusQuery {
            query_type,
            timeframe_minutes,
        } => {
            let payload = state
                .monitor
                .status_query(&query_type, timeframe_minutes)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "status query failed, substituting generic payload");
                    vox_monitor::generic_status_payload(&e.to_string())
                });
            send(
                sink,
                ServerEnvelope::SystemStatusResponse {
                    payload,
                    timestamp: stamp(state, session_id),
                },
            )
            .await;
            Ok(())
        }

        ClientEnvelope::SelfAwarenessQuery { question, context } => {
            let payload = state
                .monitor
                .capability_query(&question, &context)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "capability query failed, substituting generic payload");
                    vox_monitor::generic_capability_payload(&e.to_string())
                });
            send(
                sink,
                ServerEnvelope::SelfAwarenessResponse {
                    payload,
                    timestamp: stamp(state, session_id),
                },
            )
            .await;
            Ok(())
        }

        ClientEnvelope::ErrorAnalysisRequest => {
            let payload = state.monitor.error_analysis().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "error analysis failed, substituting generic payload");
                vox_monitor::generic_error_analysis_payload()
            });
            send(
                sink,
                ServerEnvelope::ErrorAnalysisResponse {
                    payload,
                    timestamp: stamp(state, session_id),
                },
            )
            .await;
            Ok(())
        }
    }
}

/// One chat turn: route through the providers, record the turn, emit the
/// `response`, then attempt speech synthesis best-effort.
async fn handle_chat_turn(
    state: &AppState,
    session_id: &str,
    sink: &ConnectionSink,
    text: &str,
    source: Option<&str>,
) -> Result<()> {
    let session = state
        .sessions
        .get(session_id)
        .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;

    let history: Vec<HistoryTurn> = session
        .history
        .iter()
        .map(|t| HistoryTurn {
            user: t.user.clone(),
            assistant: t.assistant.clone(),
        })
        .collect();

    let outcome = state
        .router
        .chat(
            text,
            &history,
            session.provider.as_deref(),
            session.model.as_deref(),
        )
        .await?;

    state.sessions.append_turn(
        session_id,
        ConversationTurn {
            timestamp: Utc::now(),
            user: text.to_owned(),
            assistant: outcome.text.clone(),
            provider: outcome.provider.clone(),
            model: outcome.model.clone(),
        },
    );

    send(
        sink,
        ServerEnvelope::Response {
            text: outcome.text.clone(),
            provider: outcome.provider,
            model: outcome.model,
            fallback_used: outcome.fallback_used,
            source: source.map(str::to_owned),
            timestamp: stamp(state, session_id),
        },
    )
    .await;

    // Synthesis is best-effort: a failure is logged and swallowed, never
    // turning a successful chat into an error.
    let synthesis = state.speech.synthesize(&outcome.text).await;
    if synthesis.success && !synthesis.audio_data.is_empty() {
        send(
            sink,
            ServerEnvelope::AudioResponse {
                audio_data: B64.encode(&synthesis.audio_data),
                audio_format: synthesis.format,
                duration: synthesis.duration,
                text: outcome.text,
                source: source.map(str::to_owned),
                timestamp: stamp(state, session_id),
            },
        )
        .await;
    } else {
        tracing::warn!(
            session_id = %session_id,
            error = synthesis.error.as_deref().unwrap_or("unknown"),
            "speech synthesis failed, skipping audio response"
        );
    }

    Ok(())
}

/// Decode, transcribe, report, and (when confident enough) chat.
async fn handle_audio_data(
    state: &AppState,
    session_id: &str,
    sink: &ConnectionSink,
    data: &str,
    format: &str,
) -> Result<()> {
    if data.is_empty() {
        send_transcription_failure(state, session_id, sink, "No audio data received").await;
        return Ok(());
    }

    let audio = match B64.decode(data) {
        Ok(bytes) => bytes,
        Err(e) => {
            send_transcription_failure(
                state,
                session_id,
                sink,
                &format!("audio payload undecodable: {e}"),
            )
            .await;
            return Ok(());
        }
    };

    let result = state.speech.transcribe(&audio, format).await;
    let text = result.text.trim().to_owned();

    send(
        sink,
        ServerEnvelope::Transcription {
            text: text.clone(),
            confidence: result.confidence,
            language: result.language,
            duration: result.duration,
            error: result.error.clone(),
            timestamp: stamp(state, session_id),
        },
    )
    .await;

    // Low-confidence or failed transcriptions stop here; the client has
    // the transcription envelope and no chat call is made.
    if text.is_empty() || result.error.is_some() || result.confidence <= CONFIDENCE_THRESHOLD {
        return Ok(());
    }

    handle_chat_turn(state, session_id, sink, &text, Some("voice_input")).await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Emit helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The session's current activity timestamp, carried on every outbound
/// envelope.
fn stamp(state: &AppState, session_id: &str) -> DateTime<Utc> {
    state
        .sessions
        .last_activity(session_id)
        .unwrap_or_else(Utc::now)
}

async fn send(sink: &ConnectionSink, envelope: ServerEnvelope) -> bool {
    sink.send(OutboundFrame::Envelope(envelope)).await.is_ok()
}

async fn send_error(
    state: &AppState,
    session_id: &str,
    sink: &ConnectionSink,
    message: String,
) -> bool {
    send(
        sink,
        ServerEnvelope::Error {
            message,
            timestamp: stamp(state, session_id),
        },
    )
    .await
}

async fn send_transcription_failure(
    state: &AppState,
    session_id: &str,
    sink: &ConnectionSink,
    error: &str,
) {
    send(
        sink,
        ServerEnvelope::Transcription {
            text: String::new(),
            confidence: 0.0,
            language: "unknown".into(),
            duration: 0.0,
            error: Some(error.to_owned()),
            timestamp: stamp(state, session_id),
        },
    )
    .await;
}
