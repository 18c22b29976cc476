//! WebSocket endpoint binding one connection to one session.
//!
//! Flow:
//! 1. Client upgrades `GET /v1/ws/{session_id}`.
//! 2. The session is resolved; an unknown id is rejected with close code
//!    4004 and no further state is entered.
//! 3. The connection sink is bound into the session and a
//!    `connection_established` envelope is emitted.
//! 4. The reader loop dispatches envelopes until the transport closes;
//!    per-message failures never end the loop.
//! 5. Teardown unconditionally clears the session's bound sink; the
//!    session itself survives until removed or reaped.

pub mod dispatch;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use vox_protocol::{ServerEnvelope, CLOSE_INTERNAL_ERROR, CLOSE_INVALID_SESSION};
use vox_sessions::OutboundFrame;

use crate::state::AppState;
use dispatch::FrameOutcome;

/// GET /v1/ws/{session_id} — upgrade to WebSocket.
pub async fn session_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Socket handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_socket(mut socket: WebSocket, state: AppState, session_id: String) {
    // 1. Resolve the session; reject unknown ids with a distinguishable
    //    close code.
    let Some(session) = state.sessions.get(&session_id) else {
        tracing::warn!(session_id = %session_id, "connection rejected: invalid session");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_INVALID_SESSION,
                reason: "invalid session".into(),
            })))
            .await;
        return;
    };

    let (mut ws_sink, mut ws_stream) = socket.split();

    // 2. Create the outbound channel and bind it into the session.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(64);
    state.sessions.bind(&session_id, outbound_tx.clone());

    tracing::info!(session_id = %session_id, "connection established");

    // Writer task: forwards outbound frames to the WS sink.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match frame {
                OutboundFrame::Envelope(envelope) => {
                    let json = match serde_json::to_string(&envelope) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to serialize envelope");
                            continue;
                        }
                    };
                    if ws_sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    let _ = ws_sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    // 3. Welcome envelope.
    let welcome = ServerEnvelope::ConnectionEstablished {
        session_id: session_id.clone(),
        created_at: session.created_at,
        timestamp: session.last_activity,
    };
    if outbound_tx
        .send(OutboundFrame::Envelope(welcome))
        .await
        .is_err()
    {
        tracing::warn!(session_id = %session_id, "connection lost before welcome");
        state.sessions.clear_connection(&session_id);
        return;
    }

    // 4. Reader loop: one envelope at a time until disconnect.
    while let Some(received) = ws_stream.next().await {
        let msg = match received {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "transport error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                match dispatch::process_frame(&state, &session_id, &outbound_tx, &text).await {
                    FrameOutcome::Continue => {}
                    FrameOutcome::Fatal => {
                        // Could not even surface the failure to the client;
                        // close with an internal-error code.
                        let _ = outbound_tx
                            .send(OutboundFrame::Close {
                                code: CLOSE_INTERNAL_ERROR,
                                reason: "internal error".into(),
                            })
                            .await;
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {
                // Transport-level heartbeat still counts as activity.
                state.sessions.touch(&session_id);
            }
            _ => {}
        }
    }

    // 5. Teardown: the session persists, only the binding is dropped.
    state.sessions.clear_connection(&session_id);
    writer.abort();
    tracing::info!(session_id = %session_id, "connection closed");
}
