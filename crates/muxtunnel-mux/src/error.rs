//! Error types for the tmux adapter.

use thiserror::Error;

/// Keep only the tail of stderr in errors; tmux can be chatty.
const STDERR_TAIL_BYTES: usize = 256;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("tmux not found")]
    NotFound,

    #[error("tmux {command} failed (exit {status}): {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MuxError {
    pub(crate) fn command_failed(command: &str, status: i32, stderr: &str) -> Self {
        MuxError::CommandFailed {
            command: command.to_string(),
            status,
            stderr: stderr_tail(stderr).to_string(),
        }
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed;
    }
    let start = trimmed.len() - STDERR_TAIL_BYTES;
    // Don't split a UTF-8 codepoint.
    let mut idx = start;
    while !trimmed.is_char_boundary(idx) {
        idx += 1;
    }
    &trimmed[idx..]
}
