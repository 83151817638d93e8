//! Process-table cache and effective-command resolution.
//!
//! tmux reports `pane_current_command` as whatever the pane's shell is, even
//! when the interesting process is a grandchild (`zsh -> node -> vim`). One
//! `ps` call per snapshot feeds an in-memory pid/ppid table that the walk
//! below consults instead of shelling out per pane.

use std::collections::HashMap;

/// Shell and wrapper commands to skip when walking the process tree.
/// Dash-prefixed login-shell forms (`-zsh`) are matched by stripping the dash.
const WRAPPERS: &[&str] = &[
    "zsh", "bash", "sh", "fish", "tcsh", "csh", "npm", "npx", "node",
];

/// Never walk more than this many levels down the tree.
const MAX_WALK_DEPTH: usize = 5;

#[derive(Debug, Clone)]
struct ProcessEntry {
    ppid: u32,
    comm: String,
}

/// One snapshot of the full process table (`pid -> (ppid, comm)`).
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    entries: HashMap<u32, ProcessEntry>,
}

impl ProcessTable {
    /// Parse `ps -eo pid=,ppid=,comm=` output.
    pub fn parse(ps_output: &str) -> Self {
        let mut entries = HashMap::new();
        for line in ps_output.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parts: Vec<&str> = trimmed.splitn(3, char::is_whitespace).collect();
            if parts.len() < 3 {
                continue;
            }
            if let (Ok(pid), Ok(ppid)) =
                (parts[0].trim().parse::<u32>(), parts[1].trim().parse::<u32>())
            {
                entries.insert(
                    pid,
                    ProcessEntry {
                        ppid,
                        comm: parts[2].trim().to_string(),
                    },
                );
            }
        }
        Self { entries }
    }

    /// Fetch the live process table with one `ps` invocation.
    ///
    /// A failed `ps` yields an empty table, which degrades resolution to
    /// the raw `pane_current_command`.
    pub fn read() -> Self {
        match std::process::Command::new("ps")
            .args(["-eo", "pid=,ppid=,comm="])
            .output()
        {
            Ok(output) if output.status.success() => {
                Self::parse(&String::from_utf8_lossy(&output.stdout))
            }
            _ => Self::default(),
        }
    }

    /// Resolve the effective command for a pane.
    ///
    /// If `current_command` is not a wrapper it is returned as-is. Otherwise
    /// the walk follows the first child (lowest pid) at each level, at most
    /// [`MAX_WALK_DEPTH`] deep, and returns the first non-wrapper command's
    /// basename. Wrapper-only branches fall back to `current_command`.
    pub fn effective_command(&self, pid: u32, current_command: &str) -> String {
        if !is_wrapper(current_command) {
            return current_command.to_string();
        }

        let mut current = pid;
        for _ in 0..MAX_WALK_DEPTH {
            let children = self.children_of(current);

            let Some(&child) = children.first() else {
                // Leaf reached. If we walked somewhere, report that command;
                // otherwise keep the original.
                if current != pid {
                    if let Some(entry) = self.entries.get(&current) {
                        let cmd = command_basename(&entry.comm);
                        if !cmd.is_empty() {
                            return cmd.to_string();
                        }
                    }
                }
                return current_command.to_string();
            };

            let Some(entry) = self.entries.get(&child) else {
                return current_command.to_string();
            };

            let cmd = command_basename(&entry.comm);
            if !is_wrapper(cmd) {
                return cmd.to_string();
            }

            current = child;
        }

        current_command.to_string()
    }

    fn children_of(&self, pid: u32) -> Vec<u32> {
        let mut children: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.ppid == pid)
            .map(|(child, _)| *child)
            .collect();
        children.sort_unstable();
        children
    }
}

fn is_wrapper(cmd: &str) -> bool {
    let base = cmd.strip_prefix('-').unwrap_or(cmd);
    WRAPPERS.contains(&base)
}

/// Basename of the first word of a `comm` field (`/usr/bin/vim -u NONE`
/// becomes `vim`).
fn command_basename(comm: &str) -> &str {
    let first_word = comm.split_whitespace().next().unwrap_or(comm);
    match first_word.rfind('/') {
        Some(pos) => &first_word[pos + 1..],
        None => first_word,
    }
}
