//! Per-client pseudo-terminals attached to tmux panes.
//!
//! Each WebSocket client gets its own PTY running
//! `tmux attach-session -t <target>` at the client's size, so tmux reflows
//! the session for that client instead of serving pre-rendered captures.
//! Bytes are moved as opaque slices in both directions; reads are forwarded
//! exactly as received so multi-byte sequences are never split.

mod client;
mod error;

pub use client::{PtyClient, PtyEvent};
pub use error::PtyError;
