//! The tmux hook endpoint and the pid-to-client control routing table.
//!
//! When a tmux client switches sessions, a `client-session-changed` hook
//! fires and calls `GET /api/internal/session-changed?pid&session` with the
//! tmux client's PID. That PID is the child of exactly one PTY client, so
//! the frame is routed to the WebSocket that owns it.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::state::SharedGateway;

/// A control frame destined for one stream client, already serialized.
pub type ControlFrame = String;

/// Lookup table from PTY child PID to the owning stream's control channel.
///
/// This is a weak back-reference, not ownership: entries are inserted on
/// PTY open and removed on close, and a send to a dead client just fails.
#[derive(Default)]
pub struct SessionChangedRouter {
    inner: Mutex<HashMap<u32, mpsc::UnboundedSender<ControlFrame>>>,
}

impl SessionChangedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: u32, tx: mpsc::UnboundedSender<ControlFrame>) {
        self.inner.lock().unwrap().insert(pid, tx);
    }

    pub fn unregister(&self, pid: u32) {
        self.inner.lock().unwrap().remove(&pid);
    }

    /// Route a session-changed frame to the client owning `pid`.
    /// Returns whether a live client received it.
    pub fn notify(&self, pid: u32, session: &str) -> bool {
        let frame = serde_json::json!({
            "type": "session-changed",
            "session": session,
        })
        .to_string();

        let inner = self.inner.lock().unwrap();
        match inner.get(&pid) {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionChangedQuery {
    pid: u32,
    session: String,
}

/// `GET /api/internal/session-changed?pid=<n>&session=<name>`
pub async fn session_changed(
    State(gateway): State<SharedGateway>,
    Query(query): Query<SessionChangedQuery>,
) -> Json<serde_json::Value> {
    let delivered = gateway.hooks.notify(query.pid, &query.session);
    tracing::debug!(
        pid = query.pid,
        session = %query.session,
        delivered,
        "session-changed hook"
    );
    Json(serde_json::json!({ "delivered": delivered }))
}
