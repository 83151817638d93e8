//! Session status derivation from the tail of a JSONL transcript.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How much of the transcript tail to read when deriving status.
const TAIL_READ_BYTES: u64 = 10_000;

/// A `user` line keeps the session "thinking" while the assistant composes
/// its first response, which can take tens of seconds.
const USER_THINKING_WINDOW: Duration = Duration::from_secs(60);

/// An `assistant` line only indicates activity while the file is still
/// being appended to.
const ASSISTANT_THINKING_WINDOW: Duration = Duration::from_secs(3);

/// Derived status of an assistant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Thinking,
    Done,
    Idle,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Thinking => write!(f, "thinking"),
            SessionStatus::Done => write!(f, "done"),
            SessionStatus::Idle => write!(f, "idle"),
        }
    }
}

/// Derive the status of a session from its transcript file.
///
/// Reads the last ~10 KiB, takes the last complete JSON line, and combines
/// its `type` with the file's mtime. Any read or parse failure yields
/// `Idle` — a missing or garbled transcript is not an error condition.
pub fn derive_status(jsonl_path: &Path) -> SessionStatus {
    let meta = match std::fs::metadata(jsonl_path) {
        Ok(m) => m,
        Err(_) => return SessionStatus::Idle,
    };

    let file_size = meta.len();
    if file_size == 0 {
        return SessionStatus::Idle;
    }

    let tail = match read_tail(jsonl_path, file_size) {
        Some(t) => t,
        None => return SessionStatus::Idle,
    };

    let last_line = match tail.lines().filter(|l| !l.trim().is_empty()).last() {
        Some(l) => l,
        None => return SessionStatus::Idle,
    };

    let age = meta
        .modified()
        .ok()
        .and_then(|t| t.elapsed().ok())
        .unwrap_or(Duration::MAX);

    status_for_line(last_line, age)
}

/// Status for a single transcript line given the file's age.
///
/// Split out from [`derive_status`] so the decision table is testable
/// without touching the filesystem clock.
pub fn status_for_line(line: &str, age: Duration) -> SessionStatus {
    let msg: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => return SessionStatus::Idle,
    };

    match msg.get("type").and_then(|v| v.as_str()) {
        Some("summary") => SessionStatus::Done,
        Some("user") => {
            if age < USER_THINKING_WINDOW {
                SessionStatus::Thinking
            } else {
                SessionStatus::Done
            }
        }
        Some("assistant") => {
            if age < ASSISTANT_THINKING_WINDOW {
                SessionStatus::Thinking
            } else {
                SessionStatus::Done
            }
        }
        _ => SessionStatus::Idle,
    }
}

fn read_tail(path: &Path, file_size: u64) -> Option<String> {
    let read_size = file_size.min(TAIL_READ_BYTES) as usize;
    let mut file = File::open(path).ok()?;

    if file_size > read_size as u64 {
        file.seek(SeekFrom::Start(file_size - read_size as u64)).ok()?;
    }

    let mut buffer = vec![0u8; read_size];
    let n = file.read(&mut buffer).ok()?;
    buffer.truncate(n);
    Some(String::from_utf8_lossy(&buffer).into_owned())
}
