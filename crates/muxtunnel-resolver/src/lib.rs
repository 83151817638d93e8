//! Maps user-entered project names to filesystem paths.
//!
//! Two strategies: the builtin resolver walks `$HOME` for `.git` roots and
//! ranks candidates by frecency recorded in `history.json`; the external
//! strategy shells out to zoxide and lets it keep its own database.

mod external;
mod frecency;
mod scan;

pub use frecency::{frecency_score, HistoryEntry};
pub use scan::discover_projects;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use muxtunnel_store::SettingsStore;

/// Rediscover projects at most this often.
const RESCAN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Score given to a discovered project with no selection history.
const DISCOVERED_SCORE: f64 = 0.1;

/// A ranked resolution candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectEntry {
    pub name: String,
    pub path: String,
    pub score: f64,
}

/// Active resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Builtin,
    External,
}

#[derive(Default)]
struct ScanCache {
    discovered: Vec<String>,
    last_scan: Option<Instant>,
}

pub struct ProjectResolver {
    strategy: Strategy,
    settings: Arc<SettingsStore>,
    history_path: PathBuf,
    scan_root: PathBuf,
    cache: Mutex<ScanCache>,
}

impl ProjectResolver {
    /// Initialize from settings: pick the external strategy only when it is
    /// both configured and the tool is actually present.
    pub async fn init(settings: Arc<SettingsStore>, config_dir: &Path) -> Self {
        let configured = settings.get().settings.resolver;
        let strategy = if configured == "zoxide" {
            if external::available().await {
                tracing::info!("resolver: zoxide active");
                Strategy::External
            } else {
                tracing::info!("resolver: zoxide configured but not found, using builtin");
                Strategy::Builtin
            }
        } else {
            tracing::info!("resolver: builtin project scan active");
            Strategy::Builtin
        };

        let scan_root = std::env::var("HOME").map(PathBuf::from).unwrap_or_default();
        Self::with_strategy(strategy, settings, config_dir, scan_root)
    }

    /// Fully explicit constructor, used by tests.
    pub fn with_strategy(
        strategy: Strategy,
        settings: Arc<SettingsStore>,
        config_dir: &Path,
        scan_root: PathBuf,
    ) -> Self {
        Self {
            strategy,
            settings,
            history_path: config_dir.join("history.json"),
            scan_root,
            cache: Mutex::new(ScanCache::default()),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// List candidates matching `query`, ranked by score descending.
    pub async fn list(&self, query: &str) -> Vec<ProjectEntry> {
        match self.strategy {
            Strategy::External => external::query_list(query).await,
            Strategy::Builtin => self.list_builtin(query).await,
        }
    }

    /// Resolve a single name to its best candidate.
    pub async fn resolve_one(&self, name: &str) -> Option<ProjectEntry> {
        match self.strategy {
            Strategy::External => external::query_one(name).await,
            Strategy::Builtin => self.list_builtin(name).await.into_iter().next(),
        }
    }

    /// Record a selection: bump the frecency rank for this path.
    /// The external tool tracks its own history, so this is a no-op there.
    pub fn record_selection(&self, path: &str) {
        if self.strategy == Strategy::External {
            return;
        }

        let mut history = frecency::load_history(&self.history_path);
        let now = frecency::now_unix();
        let entry = history.entry(path.to_string()).or_insert(HistoryEntry {
            rank: 0.0,
            last_accessed: now,
        });
        entry.rank += 1.0;
        entry.last_accessed = now;
        frecency::save_history(&self.history_path, &history);
    }

    // ------------------------------------------------------------------
    // builtin strategy
    // ------------------------------------------------------------------

    async fn list_builtin(&self, query: &str) -> Vec<ProjectEntry> {
        let history = frecency::load_history(&self.history_path);
        let discovered = self.discovered_projects().await;
        let now = frecency::now_unix();
        let needle = query.to_lowercase();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();

        for (path, entry) in &history {
            seen.insert(path.as_str());
            if let Some(project) = candidate(path, &needle) {
                results.push(ProjectEntry {
                    score: frecency_score(entry, now),
                    ..project
                });
            }
        }

        for path in &discovered {
            if seen.contains(path.as_str()) {
                continue;
            }
            if let Some(project) = candidate(path, &needle) {
                results.push(ProjectEntry {
                    score: DISCOVERED_SCORE,
                    ..project
                });
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }

    /// Cached project discovery; rescans lazily when stale. The walk runs
    /// on the blocking pool.
    async fn discovered_projects(&self) -> Vec<String> {
        {
            let cache = self.cache.lock().unwrap();
            let fresh = cache
                .last_scan
                .map(|at| at.elapsed() < RESCAN_INTERVAL)
                .unwrap_or(false);
            if fresh {
                return cache.discovered.clone();
            }
        }

        let settings = self.settings.get().settings;
        let ignore: HashSet<String> = settings.projects.ignore.into_iter().collect();
        let max_depth = settings.projects.max_depth;
        let root = self.scan_root.clone();

        let started = Instant::now();
        let discovered = tokio::task::spawn_blocking(move || {
            scan::discover_projects(&root, &ignore, max_depth)
        })
        .await
        .unwrap_or_default();

        tracing::info!(
            count = discovered.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "project scan complete"
        );

        let mut cache = self.cache.lock().unwrap();
        cache.discovered = discovered.clone();
        cache.last_scan = Some(Instant::now());
        discovered
    }
}

/// Build a candidate entry if the path passes the case-insensitive
/// substring filter on basename or full path.
fn candidate(path: &str, needle: &str) -> Option<ProjectEntry> {
    let name = Path::new(path)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();

    if !needle.is_empty()
        && !name.to_lowercase().contains(needle)
        && !path.to_lowercase().contains(needle)
    {
        return None;
    }

    Some(ProjectEntry {
        name,
        path: path.to_string(),
        score: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_project(root: &Path, rel: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(dir.join(".git")).expect("mkdir");
    }

    fn builtin_resolver(root: &Path, config: &Path) -> ProjectResolver {
        let settings = Arc::new(SettingsStore::open(config.to_path_buf()));
        ProjectResolver::with_strategy(
            Strategy::Builtin,
            settings,
            config,
            root.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn discovered_projects_are_listed_with_flat_score() {
        let home = tempfile::tempdir().expect("tempdir");
        let config = tempfile::tempdir().expect("tempdir");
        make_project(home.path(), "code/acme");
        make_project(home.path(), "code/widgets");

        let resolver = builtin_resolver(home.path(), config.path());
        let all = resolver.list("").await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|e| e.score == DISCOVERED_SCORE));

        let filtered = resolver.list("acme").await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "acme");
    }

    #[tokio::test]
    async fn history_outranks_discovery_and_dedupes() {
        let home = tempfile::tempdir().expect("tempdir");
        let config = tempfile::tempdir().expect("tempdir");
        make_project(home.path(), "code/acme");
        make_project(home.path(), "code/widgets");

        let resolver = builtin_resolver(home.path(), config.path());
        let acme_path = home.path().join("code/acme");
        resolver.record_selection(&acme_path.to_string_lossy());

        let all = resolver.list("").await;
        assert_eq!(all.len(), 2, "selected project must not appear twice");
        assert_eq!(all[0].name, "acme");
        // rank 1.0 accessed just now: x4 recency boost.
        assert_eq!(all[0].score, 4.0);
    }

    #[tokio::test]
    async fn resolve_one_returns_best_match() {
        let home = tempfile::tempdir().expect("tempdir");
        let config = tempfile::tempdir().expect("tempdir");
        make_project(home.path(), "code/acme");

        let resolver = builtin_resolver(home.path(), config.path());
        let hit = resolver.resolve_one("acme").await.expect("match");
        assert_eq!(hit.name, "acme");
        assert!(hit.path.ends_with("code/acme"));

        assert!(resolver.resolve_one("nonexistent-project").await.is_none());
    }

    #[tokio::test]
    async fn filter_matches_path_substring_case_insensitively() {
        let home = tempfile::tempdir().expect("tempdir");
        let config = tempfile::tempdir().expect("tempdir");
        make_project(home.path(), "Work/AcmeServer");

        let resolver = builtin_resolver(home.path(), config.path());
        assert_eq!(resolver.list("acmeserver").await.len(), 1);
        assert_eq!(resolver.list("work").await.len(), 1);
    }

    #[test]
    fn record_selection_accumulates_rank() {
        let home = tempfile::tempdir().expect("tempdir");
        let config = tempfile::tempdir().expect("tempdir");

        let resolver = builtin_resolver(home.path(), config.path());
        resolver.record_selection("/home/u/code/acme");
        resolver.record_selection("/home/u/code/acme");

        let history = frecency::load_history(&config.path().join("history.json"));
        assert_eq!(history["/home/u/code/acme"].rank, 2.0);
    }
}
