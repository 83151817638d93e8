//! Transcript discovery: maps a project path to its session files.
//!
//! Claude Code keeps per-project transcript directories named by slugging
//! the project path (`/` becomes `-`). A `sessions-index.json` file, when
//! present, carries session metadata; otherwise the `*.jsonl` files are
//! enumerated directly.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// A discovered transcript file for one assistant session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    pub session_id: String,
    pub path: PathBuf,
    pub summary: String,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    session_id: String,
    full_path: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    project_path: Option<String>,
    #[serde(default)]
    modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SessionsIndex {
    entries: Vec<IndexEntry>,
}

/// Encode a project path the way the assistant names its transcript dirs.
/// Example: `/Users/u/code/acme` -> `-Users-u-code-acme`.
pub fn project_slug(project_path: &str) -> String {
    project_path.replace('/', "-")
}

/// List session files for a project, most recently modified first.
///
/// `root` is the transcript root (normally `~/.claude/projects`).
pub fn sessions_for_project(root: &Path, project_path: &str) -> Vec<SessionFile> {
    let project_dir = root.join(project_slug(project_path));
    if !project_dir.exists() {
        return Vec::new();
    }

    let index_path = project_dir.join("sessions-index.json");
    let mut sessions = if index_path.exists() {
        read_index(&index_path, project_path)
    } else {
        scan_jsonl_files(&project_dir)
    };

    sessions.sort_by(|a, b| b.modified.cmp(&a.modified));
    sessions
}

fn read_index(index_path: &Path, project_path: &str) -> Vec<SessionFile> {
    let raw = match std::fs::read_to_string(index_path) {
        Ok(r) => r,
        Err(e) => {
            warn!(path = %index_path.display(), error = %e, "failed to read sessions index");
            return Vec::new();
        }
    };

    let index: SessionsIndex = match serde_json::from_str(&raw) {
        Ok(i) => i,
        Err(e) => {
            warn!(path = %index_path.display(), error = %e, "failed to parse sessions index");
            return Vec::new();
        }
    };

    index
        .entries
        .into_iter()
        .filter(|e| {
            // Entries without a projectPath are kept: old index versions
            // did not record it.
            e.project_path
                .as_deref()
                .map(|p| p == project_path)
                .unwrap_or(true)
        })
        .map(|e| {
            let path = PathBuf::from(&e.full_path);
            let modified = e
                .modified
                .map(SystemTime::from)
                .or_else(|| file_mtime(&path));
            SessionFile {
                session_id: e.session_id,
                path,
                summary: e.summary.unwrap_or_default(),
                modified,
            }
        })
        .collect()
}

fn scan_jsonl_files(project_dir: &Path) -> Vec<SessionFile> {
    let entries = match std::fs::read_dir(project_dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "jsonl").unwrap_or(false))
        .map(|e| {
            let path = e.path();
            let session_id = path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();
            let modified = file_mtime(&path);
            SessionFile {
                session_id,
                path,
                summary: String::new(),
                modified,
            }
        })
        .collect()
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn slug_replaces_slashes() {
        assert_eq!(project_slug("/Users/u/code/acme"), "-Users-u-code-acme");
        assert_eq!(project_slug("/"), "-");
        assert_eq!(project_slug("relative/path"), "relative-path");
    }

    #[test]
    fn missing_project_dir_yields_empty() {
        let root = tempfile::tempdir().expect("tempdir");
        assert!(sessions_for_project(root.path(), "/no/such/project").is_empty());
    }

    #[test]
    fn index_is_preferred_and_filtered_by_project_path() {
        let root = tempfile::tempdir().expect("tempdir");
        let project_dir = root.path().join(project_slug("/home/u/acme"));
        fs::create_dir_all(&project_dir).expect("mkdir");

        let a = project_dir.join("aaa.jsonl");
        let b = project_dir.join("bbb.jsonl");
        fs::write(&a, b"{}\n").expect("write");
        fs::write(&b, b"{}\n").expect("write");

        let index = serde_json::json!({
            "entries": [
                {
                    "sessionId": "aaa",
                    "fullPath": a.to_string_lossy(),
                    "summary": "older work",
                    "projectPath": "/home/u/acme",
                    "modified": "2026-07-01T10:00:00Z"
                },
                {
                    "sessionId": "bbb",
                    "fullPath": b.to_string_lossy(),
                    "summary": "newer work",
                    "projectPath": "/home/u/acme",
                    "modified": "2026-07-02T10:00:00Z"
                },
                {
                    "sessionId": "other",
                    "fullPath": "/tmp/other.jsonl",
                    "projectPath": "/home/u/other",
                    "modified": "2026-07-03T10:00:00Z"
                }
            ]
        });
        fs::write(
            project_dir.join("sessions-index.json"),
            serde_json::to_string(&index).expect("json"),
        )
        .expect("write index");

        let sessions = sessions_for_project(root.path(), "/home/u/acme");
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "bbb");
        assert_eq!(sessions[0].summary, "newer work");
        assert_eq!(sessions[1].session_id, "aaa");
    }

    #[test]
    fn fallback_scans_jsonl_files() {
        let root = tempfile::tempdir().expect("tempdir");
        let project_dir = root.path().join(project_slug("/home/u/acme"));
        fs::create_dir_all(&project_dir).expect("mkdir");
        fs::write(project_dir.join("abc.jsonl"), b"{}\n").expect("write");
        fs::write(project_dir.join("notes.txt"), b"ignore me").expect("write");

        let sessions = sessions_for_project(root.path(), "/home/u/acme");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "abc");
        assert!(sessions[0].summary.is_empty());
        assert!(sessions[0].modified.is_some());
    }

    #[test]
    fn corrupt_index_yields_empty() {
        let root = tempfile::tempdir().expect("tempdir");
        let project_dir = root.path().join(project_slug("/home/u/acme"));
        fs::create_dir_all(&project_dir).expect("mkdir");
        fs::write(project_dir.join("sessions-index.json"), b"{ not json").expect("write");

        assert!(sessions_for_project(root.path(), "/home/u/acme").is_empty());
    }
}
