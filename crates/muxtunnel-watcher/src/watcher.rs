//! The long-lived transcript watcher task.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::discovery;
use crate::latch::NotifyLatch;
use crate::status::derive_status;
use crate::AssistantLink;

/// Delay before re-checking for a transcript root that does not exist yet
/// (or re-establishing a watch after the watcher backend fails).
const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Shared handle to the assistant watcher.
///
/// Cloning is cheap; all clones share one latch. The [`run`](Self::run)
/// loop owns the filesystem watch, while query methods read transcripts
/// synchronously (small tail reads) against the shared latch.
#[derive(Debug, Clone)]
pub struct AssistantWatcher {
    root: PathBuf,
    latch: Arc<Mutex<NotifyLatch>>,
}

impl AssistantWatcher {
    /// Watcher rooted at `~/.claude/projects`.
    pub fn new() -> Self {
        let root = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".claude")
            .join("projects");
        Self::with_root(root)
    }

    /// Watcher rooted at an explicit transcript directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            latch: Arc::new(Mutex::new(NotifyLatch::new())),
        }
    }

    /// All sessions for a project, most recent first, with latch state applied.
    pub fn sessions_for_project(&self, project_path: &str) -> Vec<AssistantLink> {
        let files = discovery::sessions_for_project(&self.root, project_path);
        let mut latch = self.latch.lock().unwrap();
        files
            .into_iter()
            .map(|f| {
                let status = derive_status(&f.path);
                let notified = latch.observe(&f.session_id, status);
                AssistantLink {
                    session_id: f.session_id,
                    summary: f.summary,
                    status,
                    notified,
                }
            })
            .collect()
    }

    /// The most recently modified session for a project, if any.
    pub fn active_session(&self, project_path: &str) -> Option<AssistantLink> {
        self.sessions_for_project(project_path).into_iter().next()
    }

    /// Clear the notification latch for a session.
    pub fn mark_viewed(&self, session_id: &str) {
        self.latch.lock().unwrap().mark_viewed(session_id);
    }

    /// Run the filesystem watch loop until cancelled.
    ///
    /// Watches the transcript root recursively and feeds every `.jsonl`
    /// write through the latch. If the root does not exist (or the watch
    /// dies), retries after a short delay so a freshly created transcript
    /// directory is picked up without a restart.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            if !self.root.exists() {
                tracing::debug!(root = %self.root.display(), "transcript root missing, waiting");
                tokio::select! {
                    _ = tokio::time::sleep(RESTART_DELAY) => continue,
                    _ = cancel.cancelled() => return,
                }
            }

            match self.watch_until_closed(&cancel).await {
                Ok(()) => return, // cancelled
                Err(e) => {
                    tracing::warn!(error = %e, "transcript watch failed, restarting");
                    tokio::select! {
                        _ = tokio::time::sleep(RESTART_DELAY) => {}
                        _ = cancel.cancelled() => return,
                    }
                }
            }
        }
    }

    async fn watch_until_closed(&self, cancel: &CancellationToken) -> notify::Result<()> {
        // Bridge the synchronous notify callback into async land.
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(256);

        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            let _ = tx.blocking_send(res);
        })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        tracing::info!(root = %self.root.display(), "watching assistant transcripts");

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(Ok(event)) => {
                            // The watched root itself going away invalidates
                            // the watch; restart so a recreated directory is
                            // picked up.
                            if matches!(event.kind, EventKind::Remove(_))
                                && event.paths.iter().any(|p| p == &self.root)
                            {
                                return Err(notify::Error::generic("watch root removed"));
                            }
                            self.handle_event(&event);
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "transcript watcher error");
                        }
                        // Watcher dropped its sender: force a restart.
                        None => return Err(notify::Error::generic("watch channel closed")),
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("transcript watcher: cancellation requested");
                    return Ok(());
                }
            }
        }
    }

    fn handle_event(&self, event: &Event) {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {}
            _ => return,
        }
        for path in &event.paths {
            self.process_path(path);
        }
    }

    /// Re-derive the status for one transcript path and run the latch.
    fn process_path(&self, path: &Path) {
        if path.extension().map(|ext| ext != "jsonl").unwrap_or(true) {
            return;
        }
        let session_id = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => return,
        };

        let status = derive_status(path);
        let notified = self.latch.lock().unwrap().observe(&session_id, status);
        tracing::debug!(
            session_id = %session_id,
            status = %status,
            notified,
            "transcript changed"
        );
    }

}

impl Default for AssistantWatcher {
    fn default() -> Self {
        Self::new()
    }
}
