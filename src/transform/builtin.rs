// src/transform/builtin.rs

//! Transforms that need no external tool.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::graph::Operation;

use super::{Artifact, Transform, TransformContext, TransformFuture, TransformOutput};

/// Passes artifacts through unchanged (fonts, pre-built files).
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransform;

impl Transform for CopyTransform {
    fn apply<'a>(&'a self, _ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move { Ok(TransformOutput::new(inputs)) })
    }
}

/// Joins every input, in order, into a single artifact.
///
/// Options: `output` (required file name), `separator` (default `"\n"`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatTransform;

impl Transform for ConcatTransform {
    fn validate(&self, operation: &Operation) -> Result<()> {
        match operation.str_option("output") {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => bail!("`output` must name the concatenated file"),
        }
    }

    fn apply<'a>(&'a self, ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move {
            let output = ctx.operation.str_option("output").unwrap_or("bundle");
            let separator = ctx.operation.str_option("separator").unwrap_or("\n");

            let mut contents = Vec::new();
            for (i, input) in inputs.iter().enumerate() {
                if i > 0 {
                    contents.extend_from_slice(separator.as_bytes());
                }
                contents.extend_from_slice(&input.contents);
            }

            Ok(TransformOutput::new(vec![Artifact::new(output, contents)]))
        })
    }
}

/// Rewrites artifact paths.
///
/// Options, applied in this order:
/// - `extension`: replace the extension (`"css"`)
/// - `prefix`: prepend to the file name
/// - `suffix`: insert before the extension (`".min"` turns `app.css` into
///   `app.min.css`)
/// - `dir`: place the artifact under a subdirectory
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameTransform;

const RENAME_KEYS: [&str; 4] = ["extension", "prefix", "suffix", "dir"];

impl Transform for RenameTransform {
    fn validate(&self, operation: &Operation) -> Result<()> {
        if RENAME_KEYS.iter().all(|k| operation.str_option(k).is_none()) {
            bail!("expected at least one of {}", RENAME_KEYS.join(", "));
        }
        Ok(())
    }

    fn apply<'a>(&'a self, ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move {
            let artifacts = inputs
                .into_iter()
                .map(|a| Artifact {
                    path: renamed(&a.path, ctx.operation),
                    contents: a.contents,
                })
                .collect();
            Ok(TransformOutput::new(artifacts))
        })
    }
}

pub(crate) fn renamed(path: &Path, op: &Operation) -> PathBuf {
    let mut path = path.to_path_buf();

    if let Some(ext) = op.str_option("extension") {
        path.set_extension(ext.trim_start_matches('.'));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let prefix = op.str_option("prefix").unwrap_or("");
    let suffix = op.str_option("suffix").unwrap_or("");

    let file_name = match ext {
        Some(ext) => format!("{prefix}{stem}{suffix}.{ext}"),
        None => format!("{prefix}{stem}{suffix}"),
    };
    path.set_file_name(file_name);

    match op.str_option("dir") {
        Some(dir) => Path::new(dir).join(path),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuildMode;

    fn ctx<'a>(op: &'a Operation) -> TransformContext<'a> {
        TransformContext {
            stage: "test",
            operation: op,
            mode: BuildMode::Development,
            root: Path::new("."),
        }
    }

    #[test]
    fn rename_inserts_suffix_before_extension() {
        let op = Operation::new("rename").option("suffix", ".min");
        assert_eq!(renamed(Path::new("css/app.css"), &op), PathBuf::from("css/app.min.css"));
    }

    #[test]
    fn rename_replaces_extension_then_moves() {
        let op = Operation::new("rename")
            .option("extension", ".css")
            .option("dir", "dist");
        assert_eq!(renamed(Path::new("app.scss"), &op), PathBuf::from("dist/app.css"));
    }

    #[tokio::test]
    async fn concat_joins_in_input_order() {
        let op = Operation::new("concat").option("output", "app.js");
        let out = ConcatTransform
            .apply(
                ctx(&op),
                vec![
                    Artifact::new("vendor/a.js", "var a;"),
                    Artifact::new("app.js", "var b;"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(out.artifacts, vec![Artifact::new("app.js", "var a;\nvar b;")]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn concat_requires_output() {
        assert!(ConcatTransform.validate(&Operation::new("concat")).is_err());
    }
}
