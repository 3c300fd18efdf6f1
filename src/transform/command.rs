// src/transform/command.rs

//! Runs an external tool (compiler, minifier, optimiser, linter) as a
//! transform step.
//!
//! ```toml
//! operations = [
//!   { uses = "command", cmd = "sass --stdin", extension = "css" },
//!   { uses = "command", cmd = "stylelint --stdin", passthrough = true,
//!     diagnostic_pattern = '^(?P<file>[^:]+):(?P<line>\d+):\d+: (?P<message>.*)$' },
//! ]
//! ```
//!
//! Options:
//! - `cmd`: shell command (required)
//! - `per_file`: run once per artifact (default `true`); otherwise run once
//!   with every artifact concatenated on stdin
//! - `output`: artifact name when `per_file = false`
//! - `passthrough`: emit the inputs unchanged and only use the exit status
//!   and diagnostics (lint mode)
//! - `extension`: replace the extension of produced artifacts
//! - `diagnostic_pattern`: regex with optional named groups `file`, `line`,
//!   `message` used to turn tool output into diagnostics
//!
//! The tool sees `ASSETFLOW_ENV`, `ASSETFLOW_STAGE` and, in per-file mode,
//! `ASSETFLOW_FILE`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::debug;

use crate::exec::process::{run_shell, ProcessOutput};
use crate::graph::Operation;
use crate::scheduler::{Diagnostic, Severity};

use super::{Artifact, Transform, TransformContext, TransformFuture, TransformOutput};

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTransform;

struct CommandOptions<'a> {
    cmd: &'a str,
    per_file: bool,
    passthrough: bool,
    output: Option<&'a str>,
    extension: Option<&'a str>,
    pattern: Option<Regex>,
}

impl<'a> CommandOptions<'a> {
    fn parse(op: &'a Operation) -> Result<Self> {
        let cmd = match op.str_option("cmd") {
            Some(cmd) if !cmd.trim().is_empty() => cmd,
            _ => bail!("`cmd` is required"),
        };
        let per_file = op.bool_option("per_file").unwrap_or(true);
        let passthrough = op.bool_option("passthrough").unwrap_or(false);
        let output = op.str_option("output");

        if !per_file && !passthrough && output.is_none() {
            bail!("`output` is required when `per_file = false`");
        }

        let pattern = op
            .str_option("diagnostic_pattern")
            .map(|p| Regex::new(p).with_context(|| format!("invalid diagnostic_pattern: {p}")))
            .transpose()?;

        Ok(Self {
            cmd,
            per_file,
            passthrough,
            output,
            extension: op.str_option("extension"),
            pattern,
        })
    }

    fn output_path(&self, path: PathBuf) -> PathBuf {
        match self.extension {
            Some(ext) => path.with_extension(ext.trim_start_matches('.')),
            None => path,
        }
    }
}

impl Transform for CommandTransform {
    fn validate(&self, operation: &Operation) -> Result<()> {
        CommandOptions::parse(operation).map(|_| ())
    }

    fn apply<'a>(&'a self, ctx: TransformContext<'a>, inputs: Vec<Artifact>) -> TransformFuture<'a> {
        Box::pin(async move {
            let opts = CommandOptions::parse(ctx.operation)?;
            let mut env = vec![
                ("ASSETFLOW_ENV", ctx.mode.as_str().to_string()),
                ("ASSETFLOW_STAGE", ctx.stage.to_string()),
            ];

            let mut output = TransformOutput::default();

            if opts.per_file {
                for input in inputs {
                    let file = input.path_str();
                    env.retain(|(k, _)| *k != "ASSETFLOW_FILE");
                    env.push(("ASSETFLOW_FILE", file.clone()));

                    let result =
                        run_shell(opts.cmd, ctx.root, input.contents.clone(), &env).await?;
                    output
                        .diagnostics
                        .extend(diagnostics_for(&opts, &result, Some(&file)));

                    if !result.success {
                        continue;
                    }
                    output.artifacts.push(if opts.passthrough {
                        input
                    } else {
                        Artifact::new(opts.output_path(input.path), result.stdout)
                    });
                }
            } else {
                let mut stdin = Vec::new();
                for input in &inputs {
                    stdin.extend_from_slice(&input.contents);
                    stdin.push(b'\n');
                }

                let result = run_shell(opts.cmd, ctx.root, stdin, &env).await?;
                output.diagnostics = diagnostics_for(&opts, &result, None);

                if result.success {
                    output.artifacts = match (opts.passthrough, opts.output) {
                        (false, Some(name)) => {
                            vec![Artifact::new(opts.output_path(PathBuf::from(name)), result.stdout)]
                        }
                        _ => inputs,
                    };
                }
            }

            debug!(
                stage = ctx.stage,
                cmd = opts.cmd,
                artifacts = output.artifacts.len(),
                diagnostics = output.diagnostics.len(),
                "command transform finished"
            );
            Ok(output)
        })
    }
}

fn diagnostics_for(
    opts: &CommandOptions<'_>,
    result: &ProcessOutput,
    file: Option<&str>,
) -> Vec<Diagnostic> {
    let severity = if result.success {
        Severity::Warning
    } else {
        Severity::Error
    };

    // In passthrough mode stdout is free for tool chatter; linters commonly
    // report there.
    let mut text = result.stderr.clone();
    if opts.passthrough {
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&result.stdout));
    }

    let mut diagnostics = match (&opts.pattern, result.success) {
        (Some(pattern), _) => parse_with_pattern(&text, pattern, file, severity),
        (None, false) => text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| with_file(Diagnostic::new(severity, l), file))
            .collect(),
        (None, true) => Vec::new(),
    };

    if !result.success && diagnostics.is_empty() {
        let status = result
            .code
            .map(|c| format!("exit code {c}"))
            .unwrap_or_else(|| "a signal".to_string());
        diagnostics.push(with_file(
            Diagnostic::error(format!("`{}` failed with {status}", opts.cmd)),
            file,
        ));
    }

    diagnostics
}

fn parse_with_pattern(
    text: &str,
    pattern: &Regex,
    file: Option<&str>,
    severity: Severity,
) -> Vec<Diagnostic> {
    text.lines()
        .filter_map(|line| {
            let caps = pattern.captures(line)?;
            let message = caps
                .name("message")
                .map(|m| m.as_str())
                .unwrap_or(line)
                .trim();
            let mut diag = Diagnostic::new(severity, message);
            diag.file = caps
                .name("file")
                .map(|m| m.as_str().to_string())
                .or_else(|| file.map(str::to_string));
            diag.line = caps.name("line").and_then(|m| m.as_str().parse().ok());
            Some(diag)
        })
        .collect()
}

fn with_file(diag: Diagnostic, file: Option<&str>) -> Diagnostic {
    match file {
        Some(f) => diag.in_file(f),
        None => diag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::types::BuildMode;

    fn ctx<'a>(op: &'a Operation) -> TransformContext<'a> {
        TransformContext {
            stage: "styles",
            operation: op,
            mode: BuildMode::Production,
            root: Path::new("."),
        }
    }

    #[test]
    fn validate_requires_cmd_and_valid_regex() {
        assert!(CommandTransform.validate(&Operation::new("command")).is_err());
        let bad = Operation::new("command")
            .option("cmd", "true")
            .option("diagnostic_pattern", "(");
        assert!(CommandTransform.validate(&bad).is_err());
        let whole = Operation::new("command")
            .option("cmd", "cat")
            .option("per_file", false);
        assert!(CommandTransform.validate(&whole).is_err());
    }

    #[test]
    fn pattern_extracts_file_line_and_message() {
        let re = Regex::new(r"^(?P<file>[^:]+):(?P<line>\d+): (?P<message>.*)$").unwrap();
        let diags = parse_with_pattern(
            "noise\ncss/a.scss:12: unexpected }\n",
            &re,
            None,
            Severity::Error,
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file.as_deref(), Some("css/a.scss"));
        assert_eq!(diags[0].line, Some(12));
        assert_eq!(diags[0].message, "unexpected }");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn per_file_replaces_contents_and_extension() {
        let op = Operation::new("command")
            .option("cmd", "tr a-z A-Z")
            .option("extension", "css");
        let out = CommandTransform
            .apply(ctx(&op), vec![Artifact::new("app.scss", "a{}")])
            .await
            .unwrap();
        assert_eq!(out.artifacts, vec![Artifact::new("app.css", "A{}")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_lint_reports_errors_and_drops_artifact() {
        let op = Operation::new("command")
            .option("cmd", "echo \"bad indent in $ASSETFLOW_FILE\" >&2; exit 1")
            .option("passthrough", true);
        let out = CommandTransform
            .apply(ctx(&op), vec![Artifact::new("app.js", "x")])
            .await
            .unwrap();
        assert!(out.artifacts.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].is_error());
        assert_eq!(out.diagnostics[0].message, "bad indent in app.js");
        assert_eq!(out.diagnostics[0].file.as_deref(), Some("app.js"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passing_lint_keeps_inputs() {
        let op = Operation::new("command")
            .option("cmd", "cat > /dev/null")
            .option("passthrough", true);
        let inputs = vec![Artifact::new("a.js", "1"), Artifact::new("b.js", "2")];
        let out = CommandTransform.apply(ctx(&op), inputs.clone()).await.unwrap();
        assert_eq!(out.artifacts, inputs);
        assert!(out.diagnostics.is_empty());
    }
}
