// src/watch/path_utils.rs

//! Path helpers shared by the watcher and input resolution.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (symlinks, different absolute prefixes), we canonicalize
///   both paths and try again.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slash_str(rel));
    }

    // macOS reports /private/var/... for /var/...
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize())
        && let Ok(rel) = path_canon.strip_prefix(&root_canon)
    {
        return Some(slash_str(rel));
    }

    None
}

pub fn slash_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Split a glob into its static directory prefix and whether anything
/// dynamic follows.
///
/// - `css/**/*.scss` -> (`css`, true)
/// - `*.js` -> (``, true)
/// - `js/app.js` -> (`js`, false): a concrete file is rooted at its parent
pub fn split_glob(glob: &str) -> (PathBuf, bool) {
    let path = Path::new(glob.trim_start_matches("./"));
    let components: Vec<Component<'_>> = path.components().collect();

    let split_idx = components
        .iter()
        .position(|c| c.as_os_str().to_string_lossy().contains(GLOB_META))
        .unwrap_or(components.len());

    if split_idx == components.len() {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return (parent, false);
    }

    let root: PathBuf = components.iter().take(split_idx).collect();
    (root, true)
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because the
/// watcher is recursive.
pub fn collapse_watch_paths(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let paths: BTreeSet<PathBuf> = paths.into_iter().collect();

    let mut filtered: Vec<PathBuf> = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}
