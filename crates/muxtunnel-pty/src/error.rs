//! Error types for the PTY multiplexer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to open pty: {0}")]
    Open(String),

    #[error("failed to spawn child: {0}")]
    Spawn(String),

    #[error("pty resize failed: {0}")]
    Resize(String),

    #[error("pty io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
