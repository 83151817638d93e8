//! Frecency history persisted as `history.json`.

use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const HOUR: u64 = 3600;
const DAY: u64 = 86_400;
const WEEK: u64 = 604_800;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub rank: f64,
    pub last_accessed: u64,
}

pub type HistoryDb = HashMap<String, HistoryEntry>;

/// Combined frequency/recency score: the stored rank scaled by how recently
/// the path was selected.
pub fn frecency_score(entry: &HistoryEntry, now: u64) -> f64 {
    let elapsed = now.saturating_sub(entry.last_accessed);
    let multiplier = if elapsed < HOUR {
        4.0
    } else if elapsed < DAY {
        2.0
    } else if elapsed < WEEK {
        0.5
    } else {
        0.25
    };
    entry.rank * multiplier
}

pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub(crate) fn load_history(path: &Path) -> HistoryDb {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => HistoryDb::new(),
    }
}

/// Whole-file rewrite; a failed write logs and drops.
pub(crate) fn save_history(path: &Path, db: &HistoryDb) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(db) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                tracing::error!(path = %path.display(), error = %e, "failed to save history");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize history"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: f64, last_accessed: u64) -> HistoryEntry {
        HistoryEntry {
            rank,
            last_accessed,
        }
    }

    #[test]
    fn score_buckets_by_recency() {
        let now = 2_000_000;
        assert_eq!(frecency_score(&entry(2.0, now - 60), now), 8.0);
        assert_eq!(frecency_score(&entry(2.0, now - 2 * HOUR), now), 4.0);
        assert_eq!(frecency_score(&entry(2.0, now - 2 * DAY), now), 1.0);
        assert_eq!(frecency_score(&entry(2.0, now - 2 * WEEK), now), 0.5);
    }

    #[test]
    fn future_timestamps_count_as_recent() {
        // Clock skew: lastAccessed ahead of now must not underflow.
        let now = 1_000_000;
        assert_eq!(frecency_score(&entry(1.0, now + 500), now), 4.0);
    }

    #[test]
    fn history_roundtrips_through_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("history.json");

        let mut db = HistoryDb::new();
        db.insert("/home/u/code/acme".into(), entry(3.0, 12345));
        save_history(&path, &db);

        let loaded = load_history(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["/home/u/code/acme"].rank, 3.0);
        assert_eq!(loaded["/home/u/code/acme"].last_accessed, 12345);
    }

    #[test]
    fn missing_or_corrupt_history_is_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(load_history(&tmp.path().join("absent.json")).is_empty());

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, b"[1, 2, 3").expect("write");
        assert!(load_history(&bad).is_empty());
    }

    #[test]
    fn history_serializes_camel_case() {
        let mut db = HistoryDb::new();
        db.insert("/p".into(), entry(1.0, 99));
        let json = serde_json::to_value(&db).expect("json");
        assert_eq!(json["/p"]["lastAccessed"], 99);
        assert_eq!(json["/p"]["rank"], 1.0);
    }
}
