//! Session management for VoxRelay.
//!
//! The store owns every live session: conversation state, activity
//! timestamps, and the bound WebSocket sink. A background reaper removes
//! sessions idle past the configured timeout.

pub mod store;

pub use store::{
    ConnectionSink, ConversationTurn, OutboundFrame, Session, SessionStore, SessionSummary,
    HISTORY_CAP,
};
