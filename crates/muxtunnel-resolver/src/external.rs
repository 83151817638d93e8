//! External resolver: zoxide.

use std::path::Path;

use tokio::process::Command;

use crate::ProjectEntry;

/// Probe for zoxide on PATH.
pub async fn available() -> bool {
    Command::new("zoxide")
        .arg("--version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// `zoxide query --list --score [-- <query>]`, parsed as `score<WS>path`
/// lines.
pub async fn query_list(query: &str) -> Vec<ProjectEntry> {
    let mut args = vec!["query", "--list", "--score"];
    if !query.is_empty() {
        args.push("--");
        args.push(query);
    }

    let output = match Command::new("zoxide").args(&args).output().await {
        Ok(o) if o.status.success() => o,
        _ => return Vec::new(),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_score_lines(&stdout)
}

/// `zoxide query -- <name>`: the single best match.
pub async fn query_one(name: &str) -> Option<ProjectEntry> {
    let output = Command::new("zoxide")
        .args(["query", "--", name])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        return None;
    }

    Some(ProjectEntry {
        name: basename(&path),
        path,
        score: 1.0,
    })
}

fn parse_score_lines(stdout: &str) -> Vec<ProjectEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            let mut parts = trimmed.splitn(2, char::is_whitespace);
            let score: f64 = parts.next()?.trim().parse().ok()?;
            let path = parts.next()?.trim().to_string();
            Some(ProjectEntry {
                name: basename(&path),
                path,
                score,
            })
        })
        .collect()
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}
