//! tmux adapter: structured snapshots, pane operations, and effective
//! process resolution.
//!
//! All tmux access goes through the [`TmuxCommandRunner`] trait so tests can
//! inject mock output. The async [`MuxAdapter`] wraps the synchronous runner
//! and keeps subprocess I/O off the shared event loops.

mod activity;
mod adapter;
mod error;
mod executor;
mod process_tree;
mod snapshot;

pub use activity::has_thinking_indicator;
pub use adapter::{MuxAdapter, SESSION_CHANGED_HOOK};
pub use error::MuxError;
pub use executor::{TmuxCommandRunner, TmuxExecutor};
pub use process_tree::ProcessTable;
pub use snapshot::{Pane, Session, SessionDimensions, Window, LIST_PANES_FORMAT};
