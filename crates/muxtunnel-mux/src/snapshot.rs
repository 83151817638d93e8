//! Snapshot types and the `list-panes -a` parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::process_tree::ProcessTable;
use muxtunnel_watcher::AssistantLink;

/// Colon-delimited format string for `tmux list-panes -a -F`.
///
/// `session_path` is last because paths may themselves contain colons; the
/// parser rejoins trailing fields.
pub const LIST_PANES_FORMAT: &str = "#{session_name}:#{window_index}:#{window_name}:#{pane_index}:#{pane_id}:#{pane_active}:#{pane_width}:#{pane_height}:#{pane_left}:#{pane_top}:#{pane_pid}:#{pane_current_command}:#{session_activity}:#{session_path}";

/// Format for `display-message -t <target>` single-pane lookups.
pub const PANE_INFO_FORMAT: &str = "#{session_name}:#{window_index}:#{window_name}:#{pane_index}:#{pane_id}:#{pane_active}:#{pane_width}:#{pane_height}:#{pane_left}:#{pane_top}:#{pane_pid}:#{pane_current_command}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pane {
    pub session_name: String,
    pub window_index: u32,
    pub window_name: String,
    pub pane_index: u32,
    pub pane_id: String,
    /// Stable addressing id: `session:window.pane`.
    pub target: String,
    pub active: bool,
    pub cols: u32,
    pub rows: u32,
    pub left: u32,
    pub top: u32,
    pub pid: u32,
    /// Effective command after wrapper skipping.
    pub process: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claude_session: Option<AssistantLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub index: u32,
    pub name: String,
    pub panes: Vec<Pane>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub name: String,
    pub windows: Vec<Window>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<SessionDimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDimensions {
    pub width: u32,
    pub height: u32,
}

/// Build a session list from one `list-panes -a` invocation plus one
/// process-table read.
///
/// Windows are sorted ascending by index, panes ascending by pane index.
/// Sessions are sorted by name: grouping goes through a map, so name order
/// is the deterministic "server order".
pub fn build_sessions(list_panes_output: &str, table: &ProcessTable) -> Vec<Session> {
    let mut sessions: HashMap<String, Session> = HashMap::new();

    for line in list_panes_output.lines() {
        if line.is_empty() {
            continue;
        }

        let Some((pane, activity, path)) = parse_pane_line(line, table) else {
            continue;
        };

        let session = sessions
            .entry(pane.session_name.clone())
            .or_insert_with(|| Session {
                name: pane.session_name.clone(),
                windows: Vec::new(),
                dimensions: None,
                activity: (activity > 0).then_some(activity),
                path: path.filter(|p| !p.is_empty()),
            });

        if let Some(window) = session
            .windows
            .iter_mut()
            .find(|w| w.index == pane.window_index)
        {
            window.panes.push(pane);
        } else {
            session.windows.push(Window {
                index: pane.window_index,
                name: pane.window_name.clone(),
                panes: vec![pane],
            });
        }
    }

    let mut result: Vec<Session> = sessions.into_values().collect();
    result.sort_by(|a, b| a.name.cmp(&b.name));
    for session in &mut result {
        session.windows.sort_by_key(|w| w.index);
        for window in &mut session.windows {
            window.panes.sort_by_key(|p| p.pane_index);
        }
    }
    result
}

fn parse_pane_line(line: &str, table: &ProcessTable) -> Option<(Pane, u64, Option<String>)> {
    let parts: Vec<&str> = line.splitn(14, ':').collect();
    if parts.len() < 12 {
        return None;
    }

    let session_name = parts[0].to_string();
    let window_index: u32 = parts[1].parse().unwrap_or(0);
    let pane_index: u32 = parts[3].parse().unwrap_or(0);
    let pid: u32 = parts[10].parse().unwrap_or(0);
    let current_command = parts[11];
    let activity: u64 = parts.get(12).and_then(|s| s.parse().ok()).unwrap_or(0);
    // session_path may contain colons; splitn(14) keeps them in the tail.
    let path = parts.get(13).map(|s| s.to_string());

    let process = table.effective_command(pid, current_command);
    let target = format!("{session_name}:{window_index}.{pane_index}");

    Some((
        Pane {
            session_name,
            window_index,
            window_name: parts[2].to_string(),
            pane_index,
            pane_id: parts[4].to_string(),
            target,
            active: parts[5] == "1",
            cols: parts[6].parse().unwrap_or(80),
            rows: parts[7].parse().unwrap_or(24),
            left: parts[8].parse().unwrap_or(0),
            top: parts[9].parse().unwrap_or(0),
            pid,
            process,
            claude_session: None,
        },
        activity,
        path,
    ))
}

/// Parse the output of a `display-message` single-pane lookup.
pub(crate) fn parse_pane_info(target: &str, output: &str, table: &ProcessTable) -> Option<Pane> {
    let line = output.trim();
    let parts: Vec<&str> = line.splitn(12, ':').collect();
    if parts.len() < 12 {
        return None;
    }

    let pid: u32 = parts[10].parse().unwrap_or(0);
    let process = table.effective_command(pid, parts[11]);

    Some(Pane {
        session_name: parts[0].to_string(),
        window_index: parts[1].parse().unwrap_or(0),
        window_name: parts[2].to_string(),
        pane_index: parts[3].parse().unwrap_or(0),
        pane_id: parts[4].to_string(),
        target: target.to_string(),
        active: parts[5] == "1",
        cols: parts[6].parse().unwrap_or(80),
        rows: parts[7].parse().unwrap_or(24),
        left: parts[8].parse().unwrap_or(0),
        top: parts[9].parse().unwrap_or(0),
        pid,
        process,
        claude_session: None,
    })
}

/// Parse `#{window_width}:#{window_height}` output.
pub(crate) fn parse_dimensions(output: &str) -> Option<SessionDimensions> {
    let trimmed = output.trim();
    let mut parts = trimmed.splitn(2, ':');
    let width: u32 = parts.next()?.parse().ok()?;
    let height: u32 = parts.next()?.parse().ok()?;
    Some(SessionDimensions { width, height })
}
