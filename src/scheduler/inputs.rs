// src/scheduler/inputs.rs

//! Input selection: turn a stage's globs into an ordered file list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::GlobSet;

use crate::fs::FileSystem;
use crate::graph::Stage;
use crate::watch::path_utils::{relative_str, split_glob};
use crate::watch::patterns::{build_globset, compile_matcher};

const TEMP_SUFFIX: &str = ".assetflow-tmp";

/// One selected input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Path as handed to the filesystem (`root` joined).
    pub path: PathBuf,
    /// Path relative to the static prefix of the glob that selected it.
    pub relative: PathBuf,
}

/// Resolve `stage.inputs` against `root`.
///
/// Globs are evaluated in declaration order, each glob's matches are sorted
/// by path, and a file already selected by an earlier glob is not selected
/// again. `!`-prefixed globs remove files from every include glob. A glob
/// whose base directory does not exist selects nothing.
pub fn resolve_inputs(fs: &dyn FileSystem, root: &Path, stage: &Stage) -> Result<Vec<InputFile>> {
    let excludes: Vec<String> = stage.exclude_globs().map(str::to_string).collect();
    let exclude_set = if excludes.is_empty() {
        None
    } else {
        Some(build_globset(&excludes)?)
    };

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut selected = Vec::new();

    for glob in stage.include_globs() {
        let (base, dynamic) = split_glob(glob);
        let base_dir = if base.as_os_str().is_empty() {
            root.to_path_buf()
        } else {
            root.join(&base)
        };

        let mut matches = if dynamic {
            let matcher = compile_matcher(glob)?;
            walk_files(fs, &base_dir)?
                .into_iter()
                .filter(|path| {
                    relative_str(root, path).is_some_and(|rel| matcher.is_match(rel.as_str()))
                })
                .collect()
        } else {
            let file = root.join(glob);
            if fs.is_file(&file) { vec![file] } else { Vec::new() }
        };
        matches.sort();

        for path in matches {
            if is_excluded(exclude_set.as_ref(), root, &path) || !seen.insert(path.clone()) {
                continue;
            }
            let relative = path
                .strip_prefix(&base_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default());
            selected.push(InputFile { path, relative });
        }
    }

    Ok(selected)
}

fn is_excluded(set: Option<&GlobSet>, root: &Path, path: &Path) -> bool {
    match (set, relative_str(root, path)) {
        (Some(set), Some(rel)) => set.is_match(rel.as_str()),
        _ => false,
    }
}

/// Every regular file below `dir`, skipping our own temp files.
fn walk_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    if !fs.is_dir(dir) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs.read_dir(&current)? {
            if fs.is_dir(&entry) {
                stack.push(entry);
            } else if fs.is_file(&entry) && !is_temp_file(&entry) {
                files.push(entry);
            }
        }
    }
    Ok(files)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn fixture() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("./css/b.scss", "b");
        fs.add_file("./css/a.scss", "a");
        fs.add_file("./css/partials/_vars.scss", "v");
        fs.add_file("./css/.app.css.assetflow-tmp", "x");
        fs.add_file("./js/vendor/jq.min.js", "jq");
        fs.add_file("./js/app.js", "app");
        fs
    }

    fn relatives(files: &[InputFile]) -> Vec<String> {
        files.iter().map(|f| f.relative.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn sorted_matches_relative_to_glob_base() {
        let fs = fixture();
        let stage = Stage::new("styles").input("./css/**/*.scss");
        let files = resolve_inputs(&fs, Path::new("."), &stage).unwrap();
        assert_eq!(relatives(&files), vec!["a.scss", "b.scss", "partials/_vars.scss"]);
        assert_eq!(files[0].path, PathBuf::from("./css/a.scss"));
    }

    #[test]
    fn declaration_order_wins_and_duplicates_drop() {
        let fs = fixture();
        let stage = Stage::new("scripts")
            .input("js/vendor/*.js")
            .input("js/**/*.js");
        let files = resolve_inputs(&fs, Path::new("."), &stage).unwrap();
        assert_eq!(relatives(&files), vec!["jq.min.js", "app.js"]);
    }

    #[test]
    fn bang_globs_exclude() {
        let fs = fixture();
        let stage = Stage::new("lint").input("js/**/*.js").input("!js/vendor/**");
        let files = resolve_inputs(&fs, Path::new("."), &stage).unwrap();
        assert_eq!(relatives(&files), vec!["app.js"]);
    }

    #[test]
    fn concrete_file_and_missing_base() {
        let fs = fixture();
        let stage = Stage::new("one").input("js/app.js").input("fonts/**/*");
        let files = resolve_inputs(&fs, Path::new("."), &stage).unwrap();
        assert_eq!(relatives(&files), vec!["app.js"]);

        let empty = Stage::new("none");
        assert!(resolve_inputs(&fs, Path::new("."), &empty).unwrap().is_empty());
    }
}
