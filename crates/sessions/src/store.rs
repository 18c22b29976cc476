//! In-memory session registry.
//!
//! Sessions are created over REST before any connection exists, bound to
//! one WebSocket at a time, and removed either explicitly or by the
//! reaper once idle past the timeout. All state is process-local.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use vox_protocol::ServerEnvelope;

/// Conversation turns kept per session; the oldest is evicted past this.
pub const HISTORY_CAP: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the store (or a handler) can push toward a session's WebSocket
/// writer task.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Envelope(ServerEnvelope),
    /// Ask the writer task to close the transport and exit.
    Close { code: u16, reason: String },
}

/// Channel into a session's WebSocket writer task.
pub type ConnectionSink = mpsc::Sender<OutboundFrame>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single turn of conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub assistant: String,
    pub provider: String,
    pub model: String,
}

/// One live session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Bound connection, absent while disconnected. At most one at a time.
    pub sink: Option<ConnectionSink>,
    pub history: VecDeque<ConversationTurn>,
    /// Preferred provider for this session's chat turns.
    pub provider: Option<String>,
    /// Preferred model for this session's chat turns.
    pub model: Option<String>,
    /// Free-form per-session settings.
    pub settings: HashMap<String, serde_json::Value>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_activity: now,
            sink: None,
            history: VecDeque::new(),
            provider: None,
            model: None,
            settings: HashMap::new(),
        }
    }
}

/// Summary info returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub connected: bool,
    pub history_len: usize,
    pub provider: Option<String>,
    pub model: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Thread-safe registry of all live sessions.
///
/// Mutating operations serialize on one coarse lock; nothing holds the
/// lock across an `.await`, so `reap` and `broadcast` copy out what they
/// need before any send.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout: Duration::seconds(idle_timeout_secs as i64),
        }
    }

    /// Allocate a fresh session with no bound connection.
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .insert(id.clone(), Session::new(id.clone()));
        tracing::info!(session_id = %id, "session created");
        id
    }

    /// Look up a session by id, touching its activity timestamp on hit.
    /// Returns a snapshot; the store keeps ownership.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(session_id)?;
        session.last_activity = Utc::now();
        Some(session.clone())
    }

    /// Remove a session. If a connection is bound, its closure is
    /// scheduled best-effort; removal never blocks on transport teardown.
    /// No-op on an unknown id.
    pub fn remove(&self, session_id: &str) {
        let removed = self.sessions.write().remove(session_id);
        if let Some(session) = removed {
            if let Some(sink) = session.sink {
                schedule_close(sink, "session removed");
            }
            tracing::info!(session_id = %session_id, "session removed");
        }
    }

    /// Remove every session idle past the timeout. Returns how many were
    /// reaped.
    ///
    /// The expired set is computed from a snapshot; each candidate is
    /// re-checked under the write lock so a session touched mid-scan
    /// survives.
    pub fn reap(&self) -> usize {
        let cutoff = Utc::now() - self.idle_timeout;

        let expired: Vec<String> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter(|(_, s)| s.last_activity < cutoff)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut reaped = 0;
        for id in expired {
            let removed = {
                let mut sessions = self.sessions.write();
                match sessions.get(&id) {
                    Some(s) if s.last_activity < cutoff => sessions.remove(&id),
                    _ => None,
                }
            };
            if let Some(session) = removed {
                if let Some(sink) = session.sink {
                    schedule_close(sink, "session expired");
                }
                tracing::info!(session_id = %id, "reaped idle session");
                reaped += 1;
            }
        }
        reaped
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Send the same envelope to every session with a bound connection.
    /// A failure on one session is logged and does not stop the others.
    pub async fn broadcast(&self, envelope: ServerEnvelope) {
        let sinks: Vec<(String, ConnectionSink)> = {
            let sessions = self.sessions.read();
            sessions
                .values()
                .filter_map(|s| s.sink.clone().map(|sink| (s.id.clone(), sink)))
                .collect()
        };

        for (id, sink) in sinks {
            if let Err(e) = sink.send(OutboundFrame::Envelope(envelope.clone())).await {
                tracing::warn!(session_id = %id, error = %e, "broadcast send failed");
            }
        }
    }

    // ── Connection binding ─────────────────────────────────────────

    /// Bind a connection sink into a session, replacing (and closing) any
    /// previous one. Returns `false` when the session does not exist.
    pub fn bind(&self, session_id: &str, sink: ConnectionSink) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.last_activity = Utc::now();
                if let Some(old) = session.sink.replace(sink) {
                    schedule_close(old, "superseded by new connection");
                }
                true
            }
            None => false,
        }
    }

    /// Drop the bound connection. The session persists and is reachable
    /// again on reconnection until reaped.
    pub fn clear_connection(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.sink = None;
        }
    }

    // ── Per-session mutation ───────────────────────────────────────

    /// Update the activity timestamp.
    pub fn touch(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.last_activity = Utc::now();
        }
    }

    /// Append a completed chat turn, evicting the oldest past the cap.
    pub fn append_turn(&self, session_id: &str, turn: ConversationTurn) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.history.push_back(turn);
            while session.history.len() > HISTORY_CAP {
                session.history.pop_front();
            }
            session.last_activity = Utc::now();
        }
    }

    /// Overwrite the session's preferred provider/model. Passing `None`
    /// clears a field (switching providers invalidates the old model id).
    pub fn set_preference(
        &self,
        session_id: &str,
        provider: Option<String>,
        model: Option<String>,
    ) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.provider = provider;
            session.model = model;
        }
    }

    /// Read the activity timestamp without touching it. Used to stamp
    /// outbound envelopes.
    pub fn last_activity(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.sessions
            .read()
            .get(session_id)
            .map(|s| s.last_activity)
    }

    /// Clone out the conversation history.
    pub fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions
            .read()
            .get(session_id)
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// List summaries of all live sessions.
    pub fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .values()
            .map(|s| SessionSummary {
                session_id: s.id.clone(),
                created_at: s.created_at,
                last_activity: s.last_activity,
                connected: s.sink.is_some(),
                history_len: s.history.len(),
                provider: s.provider.clone(),
                model: s.model.clone(),
            })
            .collect()
    }
}

/// Push a close frame toward a writer task without waiting on it.
fn schedule_close(sink: ConnectionSink, reason: &str) {
    let reason = reason.to_owned();
    tokio::spawn(async move {
        let _ = sink
            .send(OutboundFrame::Close {
                code: 1000,
                reason,
            })
            .await;
    });
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(n: usize) -> ConversationTurn {
        ConversationTurn {
            timestamp: Utc::now(),
            user: format!("question {n}"),
            assistant: format!("answer {n}"),
            provider: "openai".into(),
            model: "gpt-4o".into(),
        }
    }

    #[test]
    fn count_tracks_create_and_remove() {
        let store = SessionStore::new(3600);
        assert_eq!(store.count(), 0);

        let a = store.create();
        let b = store.create();
        let _c = store.create();
        assert_eq!(store.count(), 3);

        store.remove(&a);
        store.remove(&b);
        assert_eq!(store.count(), 1);

        // Removing an unknown id is a no-op.
        store.remove("nope");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn get_touches_last_activity() {
        let store = SessionStore::new(3600);
        let id = store.create();

        let first = store.get(&id).unwrap().last_activity;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.get(&id).unwrap().last_activity;
        assert!(second > first, "get must advance last_activity");
    }

    #[test]
    fn get_unknown_returns_none() {
        let store = SessionStore::new(3600);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn history_caps_at_ten_preserving_order() {
        let store = SessionStore::new(3600);
        let id = store.create();

        for n in 0..11 {
            store.append_turn(&id, turn(n));
        }

        let history = store.history(&id);
        assert_eq!(history.len(), HISTORY_CAP);
        // Turn 0 evicted; 1..=10 remain in order.
        assert_eq!(history[0].user, "question 1");
        assert_eq!(history[9].user, "question 10");
    }

    #[test]
    fn reap_removes_only_expired_sessions() {
        let store = SessionStore::new(3600);
        let stale = store.create();
        let fresh = store.create();

        // Backdate the stale session past the cutoff.
        {
            let mut sessions = store.sessions.write();
            sessions.get_mut(&stale).unwrap().last_activity =
                Utc::now() - Duration::seconds(3601);
        }

        let reaped = store.reap();
        assert_eq!(reaped, 1);
        assert!(store.get(&stale).is_none());
        assert!(store.get(&fresh).is_some());
    }

    #[test]
    fn reap_spares_sessions_touched_after_snapshot() {
        let store = SessionStore::new(3600);
        let id = store.create();
        {
            let mut sessions = store.sessions.write();
            sessions.get_mut(&id).unwrap().last_activity =
                Utc::now() - Duration::seconds(7200);
        }
        // Activity arrives before the sweep: the re-check must spare it.
        store.touch(&id);
        assert_eq!(store.reap(), 0);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn set_preference_overwrites_both_fields() {
        let store = SessionStore::new(3600);
        let id = store.create();

        store.set_preference(
            &id,
            Some("claude".into()),
            Some("claude-3-haiku-20240307".into()),
        );
        let session = store.get(&id).unwrap();
        assert_eq!(session.provider.as_deref(), Some("claude"));
        assert_eq!(session.model.as_deref(), Some("claude-3-haiku-20240307"));

        // A provider switch without a model clears the stale model id.
        store.set_preference(&id, Some("openai".into()), None);
        let session = store.get(&id).unwrap();
        assert_eq!(session.provider.as_deref(), Some("openai"));
        assert!(session.model.is_none());
    }

    #[tokio::test]
    async fn bind_replaces_previous_connection() {
        let store = SessionStore::new(3600);
        let id = store.create();

        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        assert!(store.bind(&id, tx1));
        assert!(store.bind(&id, tx2));

        // The first sink received a close frame.
        let frame = rx1.recv().await.expect("close frame for old sink");
        assert!(matches!(frame, OutboundFrame::Close { .. }));

        assert!(!store.bind("missing", mpsc::channel(1).0));
    }

    #[tokio::test]
    async fn broadcast_skips_dead_sinks() {
        let store = SessionStore::new(3600);
        let a = store.create();
        let b = store.create();
        let _unbound = store.create();

        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, rx_b) = mpsc::channel(4);
        store.bind(&a, tx_a);
        store.bind(&b, tx_b);
        drop(rx_b); // b's connection is gone

        store
            .broadcast(ServerEnvelope::Pong {
                timestamp: Utc::now(),
            })
            .await;

        // a still got the envelope even though b's send failed.
        let frame = rx_a.recv().await.expect("broadcast frame");
        assert!(matches!(frame, OutboundFrame::Envelope(_)));
    }

    #[tokio::test]
    async fn remove_schedules_close_for_bound_connection() {
        let store = SessionStore::new(3600);
        let id = store.create();
        let (tx, mut rx) = mpsc::channel(4);
        store.bind(&id, tx);

        store.remove(&id);
        let frame = rx.recv().await.expect("close frame");
        match frame {
            OutboundFrame::Close { reason, .. } => assert_eq!(reason, "session removed"),
            other => panic!("expected close frame, got {other:?}"),
        }
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn clear_connection_keeps_session_alive() {
        let store = SessionStore::new(3600);
        let id = store.create();
        let (tx, _rx) = mpsc::channel(4);
        store.bind(&id, tx);

        store.clear_connection(&id);
        let session = store.get(&id).expect("session persists");
        assert!(session.sink.is_none());
    }
}
