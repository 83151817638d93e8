//! Filesystem project discovery.

use std::collections::HashSet;
use std::path::Path;

/// Walk `root` looking for project directories.
///
/// A directory containing a `.git` entry is a project; the walk does not
/// descend into it. Dot-directories are skipped except `.config`, as are
/// basenames in `ignore`. `max_depth` bounds recursion below `root`.
pub fn discover_projects(root: &Path, ignore: &HashSet<String>, max_depth: u32) -> Vec<String> {
    let mut projects = Vec::new();
    walk(root, 0, max_depth, ignore, &mut projects);
    projects
}

fn walk(
    dir: &Path,
    depth: u32,
    max_depth: u32,
    ignore: &HashSet<String>,
    projects: &mut Vec<String>,
) {
    if depth > max_depth {
        return;
    }

    if dir.join(".git").exists() {
        projects.push(dir.to_string_lossy().into_owned());
        return;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') && name != ".config" {
            continue;
        }
        if ignore.contains(name.as_ref()) {
            continue;
        }

        walk(&entry.path(), depth + 1, max_depth, ignore, projects);
    }
}
