//! Async adapter over the synchronous tmux runner.
//!
//! Every method pushes subprocess I/O onto the blocking pool; nothing here
//! blocks a shared event loop.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::activity;
use crate::error::MuxError;
use crate::executor::{TmuxCommandRunner, TmuxExecutor};
use crate::process_tree::ProcessTable;
use crate::snapshot::{self, Pane, Session, SessionDimensions, LIST_PANES_FORMAT, PANE_INFO_FORMAT};

/// Hook name the daemon installs for client-session switches.
pub const SESSION_CHANGED_HOOK: &str = "client-session-changed";

#[derive(Clone)]
pub struct MuxAdapter {
    runner: Arc<dyn TmuxCommandRunner>,
}

impl MuxAdapter {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(TmuxExecutor::new()))
    }

    pub fn with_runner(runner: Arc<dyn TmuxCommandRunner>) -> Self {
        Self { runner }
    }

    /// Whether a tmux server is reachable.
    pub async fn is_running(&self) -> bool {
        let runner = Arc::clone(&self.runner);
        tokio::task::spawn_blocking(move || runner.succeeds(&["list-sessions"]))
            .await
            .unwrap_or(false)
    }

    /// Produce an immutable snapshot of all sessions.
    ///
    /// One `list-panes -a` call and one `ps` read run concurrently; window
    /// dimensions are then fetched in parallel across sessions. An
    /// unavailable tmux yields an empty list, not an error.
    pub async fn snapshot(&self) -> Vec<Session> {
        let runner = Arc::clone(&self.runner);
        let panes_task = tokio::task::spawn_blocking(move || {
            runner.run(&["list-panes", "-a", "-F", LIST_PANES_FORMAT])
        });
        let table_task = tokio::task::spawn_blocking(ProcessTable::read);

        let (panes_result, table_result) = tokio::join!(panes_task, table_task);

        let output = match panes_result {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "list-panes failed, returning empty snapshot");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "list-panes worker task failed");
                return Vec::new();
            }
        };
        let table = table_result.unwrap_or_default();

        let mut sessions = snapshot::build_sessions(&output, &table);

        let dim_tasks: Vec<_> = sessions
            .iter()
            .map(|s| {
                let runner = Arc::clone(&self.runner);
                let name = s.name.clone();
                tokio::task::spawn_blocking(move || dimensions_blocking(runner.as_ref(), &name))
            })
            .collect();

        for (session, result) in sessions.iter_mut().zip(join_all(dim_tasks).await) {
            session.dimensions = result.ok().flatten();
        }

        sessions
    }

    /// Create a session if it does not already exist.
    pub async fn create_session(&self, name: &str, cwd: &str) -> Result<(), MuxError> {
        let runner = Arc::clone(&self.runner);
        let name = name.to_string();
        let cwd = cwd.to_string();
        tokio::task::spawn_blocking(move || {
            if runner.succeeds(&["has-session", "-t", &name]) {
                return Ok(());
            }
            runner
                .run(&["new-session", "-d", "-s", &name, "-c", &cwd])
                .map(|_| ())
        })
        .await?
    }

    pub async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        self.run_unit(vec!["kill-session".into(), "-t".into(), name.into()])
            .await
    }

    pub async fn kill_pane(&self, target: &str) -> Result<(), MuxError> {
        self.run_unit(vec!["kill-pane".into(), "-t".into(), target.into()])
            .await
    }

    /// Send literal text to a pane followed by Enter.
    pub async fn send_keys(&self, target: &str, text: &str) -> Result<(), MuxError> {
        let runner = Arc::clone(&self.runner);
        let target = target.to_string();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            runner.run(&["send-keys", "-t", &target, "-l", &text])?;
            runner.run(&["send-keys", "-t", &target, "Enter"]).map(|_| ())
        })
        .await?
    }

    /// Send Ctrl+C to a pane.
    pub async fn send_interrupt(&self, target: &str) -> Result<(), MuxError> {
        self.run_unit(vec![
            "send-keys".into(),
            "-t".into(),
            target.into(),
            "C-c".into(),
        ])
        .await
    }

    /// Look up a single pane. `None` when the target is gone.
    pub async fn pane_info(&self, target: &str) -> Option<Pane> {
        let runner = Arc::clone(&self.runner);
        let target = target.to_string();
        tokio::task::spawn_blocking(move || {
            let output = runner
                .run(&["display-message", "-t", &target, "-p", PANE_INFO_FORMAT])
                .ok()?;
            let table = ProcessTable::read();
            snapshot::parse_pane_info(&target, &output, &table)
        })
        .await
        .ok()
        .flatten()
    }

    /// A pane's current working directory.
    pub async fn pane_cwd(&self, target: &str) -> Option<String> {
        let out = self
            .run_capture(vec![
                "display-message".into(),
                "-t".into(),
                target.into(),
                "-p".into(),
                "#{pane_current_path}".into(),
            ])
            .await?;
        let cwd = out.trim().to_string();
        (!cwd.is_empty()).then_some(cwd)
    }

    /// Capture recent pane content with escape sequences preserved.
    /// `start_line` is relative to the visible area (e.g. `-10`).
    pub async fn capture_with_escapes(&self, target: &str, start_line: i32) -> Option<String> {
        self.run_capture(vec![
            "capture-pane".into(),
            "-t".into(),
            target.into(),
            "-p".into(),
            "-e".into(),
            "-S".into(),
            start_line.to_string(),
        ])
        .await
    }

    /// Whether the pane currently shows the assistant's thinking spinner.
    pub async fn is_pane_thinking(&self, target: &str) -> bool {
        match self.capture_with_escapes(target, -10).await {
            Some(capture) => activity::has_thinking_indicator(&capture),
            None => false,
        }
    }

    /// Install a global hook that runs `command` on `hook`.
    pub async fn set_hook(&self, hook: &str, command: &str) -> Result<(), MuxError> {
        self.run_unit(vec![
            "set-hook".into(),
            "-g".into(),
            hook.into(),
            command.into(),
        ])
        .await
    }

    /// Remove a previously installed global hook.
    pub async fn unset_hook(&self, hook: &str) -> Result<(), MuxError> {
        self.run_unit(vec!["set-hook".into(), "-gu".into(), hook.into()])
            .await
    }

    // ------------------------------------------------------------------
    // internal
    // ------------------------------------------------------------------

    async fn run_unit(&self, args: Vec<String>) -> Result<(), MuxError> {
        let runner = Arc::clone(&self.runner);
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            runner.run(&refs).map(|_| ())
        })
        .await?
    }

    async fn run_capture(&self, args: Vec<String>) -> Option<String> {
        let runner = Arc::clone(&self.runner);
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            runner.run(&refs).ok()
        })
        .await
        .ok()
        .flatten()
    }
}

impl Default for MuxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn dimensions_blocking(
    runner: &dyn TmuxCommandRunner,
    session_name: &str,
) -> Option<SessionDimensions> {
    let output = runner
        .run(&[
            "display-message",
            "-t",
            session_name,
            "-p",
            "#{window_width}:#{window_height}",
        ])
        .ok()?;
    snapshot::parse_dimensions(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted runner: answers by subcommand, records invocations.
    struct MockRunner {
        calls: Mutex<Vec<Vec<String>>>,
        has_session: bool,
    }

    impl MockRunner {
        fn new(has_session: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                has_session,
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TmuxCommandRunner for MockRunner {
        fn run(&self, args: &[&str]) -> Result<String, MuxError> {
            self.calls
                .lock()
                .unwrap()
                .push(args.iter().map(|s| s.to_string()).collect());

            match args.first().copied() {
                Some("list-panes") => Ok([
                    "beta:0:shell:0:%2:1:80:24:0:0:0:zsh:0:/tmp",
                    "alfa:0:dev:0:%1:1:120:40:0:0:0:vim:99:/home/u",
                ]
                .join("\n")),
                Some("display-message") if args.contains(&"#{window_width}:#{window_height}") => {
                    Ok("120:40\n".into())
                }
                Some("display-message") if args.contains(&PANE_INFO_FORMAT) => {
                    Ok("alfa:0:dev:0:%1:1:120:40:0:0:0:vim\n".into())
                }
                Some("display-message") => Ok("/home/u/project\n".into()),
                Some("has-session") => {
                    if self.has_session {
                        Ok(String::new())
                    } else {
                        Err(MuxError::command_failed("has-session", 1, "no session"))
                    }
                }
                Some("new-session") | Some("kill-session") | Some("kill-pane")
                | Some("send-keys") | Some("set-hook") => Ok(String::new()),
                _ => Err(MuxError::command_failed("unknown", 1, "unexpected call")),
            }
        }
    }

    #[tokio::test]
    async fn snapshot_groups_sorts_and_attaches_dimensions() {
        let adapter = MuxAdapter::with_runner(Arc::new(MockRunner::new(true)));
        let sessions = adapter.snapshot().await;

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].name, "alfa");
        assert_eq!(sessions[1].name, "beta");
        let dims = sessions[0].dimensions.as_ref().expect("dims");
        assert_eq!((dims.width, dims.height), (120, 40));
    }

    #[tokio::test]
    async fn snapshot_is_empty_when_tmux_is_gone() {
        let adapter =
            MuxAdapter::with_runner(Arc::new(TmuxExecutor::with_bin("/nonexistent/tmux")));
        assert!(adapter.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn create_session_is_idempotent() {
        let runner = Arc::new(MockRunner::new(true));
        let adapter = MuxAdapter::with_runner(runner.clone());
        adapter.create_session("alfa", "/home/u").await.expect("ok");

        let calls = runner.calls();
        assert!(calls.iter().any(|c| c[0] == "has-session"));
        assert!(!calls.iter().any(|c| c[0] == "new-session"));
    }

    #[tokio::test]
    async fn create_session_spawns_when_missing() {
        let runner = Arc::new(MockRunner::new(false));
        let adapter = MuxAdapter::with_runner(runner.clone());
        adapter.create_session("fresh", "/tmp").await.expect("ok");

        let calls = runner.calls();
        let new_session = calls
            .iter()
            .find(|c| c[0] == "new-session")
            .expect("new-session called");
        assert_eq!(new_session[3], "fresh");
        assert_eq!(new_session[5], "/tmp");
    }

    #[tokio::test]
    async fn send_keys_sends_literal_then_enter() {
        let runner = Arc::new(MockRunner::new(true));
        let adapter = MuxAdapter::with_runner(runner.clone());
        adapter.send_keys("alfa:0.0", "ls -la").await.expect("ok");

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains(&"-l".to_string()));
        assert!(calls[0].contains(&"ls -la".to_string()));
        assert_eq!(calls[1].last().map(String::as_str), Some("Enter"));
    }

    #[tokio::test]
    async fn pane_info_returns_parsed_pane() {
        let adapter = MuxAdapter::with_runner(Arc::new(MockRunner::new(true)));
        let pane = adapter.pane_info("alfa:0.0").await.expect("pane");
        assert_eq!(pane.target, "alfa:0.0");
        assert_eq!(pane.process, "vim");
    }

    #[tokio::test]
    async fn kill_errors_are_typed() {
        let adapter =
            MuxAdapter::with_runner(Arc::new(TmuxExecutor::with_bin("/nonexistent/tmux")));
        match adapter.kill_pane("ghost:0.0").await {
            Err(MuxError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
