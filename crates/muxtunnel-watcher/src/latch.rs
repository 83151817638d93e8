//! One-shot notification latch per assistant session.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::status::SessionStatus;

#[derive(Debug, Clone, Copy, Default)]
struct LatchEntry {
    notified: bool,
    viewed_at: Option<SystemTime>,
}

/// Tracks `(notified, viewed_at, prev_status)` per session id.
///
/// The latch trips on the `thinking -> done` transition, or whenever a
/// session is `done` and has neither been notified nor viewed. It is cleared
/// only by [`NotifyLatch::mark_viewed`]; a new turn (leaving `done`) resets
/// `viewed_at` so the next completion notifies again.
#[derive(Debug, Default)]
pub struct NotifyLatch {
    entries: HashMap<String, LatchEntry>,
    previous_status: HashMap<String, SessionStatus>,
}

impl NotifyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observed status for a session and return the latch state.
    pub fn observe(&mut self, session_id: &str, status: SessionStatus) -> bool {
        let prev = self.previous_status.get(session_id).copied();
        let mut entry = self.entries.get(session_id).copied().unwrap_or_default();

        // A new turn started: the previous view no longer covers it.
        if prev == Some(SessionStatus::Done) && status != SessionStatus::Done {
            entry.viewed_at = None;
        }

        if prev == Some(SessionStatus::Thinking) && status == SessionStatus::Done {
            tracing::info!(session_id, "assistant session completed");
            entry.notified = true;
        }

        if status == SessionStatus::Done && !entry.notified && entry.viewed_at.is_none() {
            tracing::info!(session_id, "assistant session needs attention");
            entry.notified = true;
        }

        self.entries.insert(session_id.to_string(), entry);
        self.previous_status.insert(session_id.to_string(), status);
        entry.notified
    }

    /// Clear the latch: the client has looked at this session.
    pub fn mark_viewed(&mut self, session_id: &str) {
        self.entries.insert(
            session_id.to_string(),
            LatchEntry {
                notified: false,
                viewed_at: Some(SystemTime::now()),
            },
        );
    }

    /// Current latch state without feeding a new observation.
    pub fn is_notified(&self, session_id: &str) -> bool {
        self.entries
            .get(session_id)
            .map(|e| e.notified)
            .unwrap_or(false)
    }
}
