//! Watches Claude Code transcript files and derives per-session status.
//!
//! Transcripts are append-only JSONL files under
//! `~/.claude/projects/<slugged-project>/<sessionId>.jsonl`. The watcher
//! keeps a one-shot notification latch per session: it trips when a session
//! finishes a turn and stays set until the client marks the session viewed.

mod discovery;
mod latch;
mod status;
mod watcher;

pub use discovery::{project_slug, sessions_for_project, SessionFile};
pub use latch::NotifyLatch;
pub use status::{derive_status, SessionStatus};
pub use watcher::AssistantWatcher;

use serde::{Deserialize, Serialize};

/// Per-pane metadata tying a pane to an assistant session.
///
/// Serialized as the `claudeSession` field of a pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantLink {
    pub session_id: String,
    pub summary: String,
    pub status: SessionStatus,
    pub notified: bool,
}
