// src/scheduler/result.rs

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::TaskName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A message reported by a transform, optionally pinned to a file/line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}: {}", self.message),
            (Some(file), None) => write!(f, "{file}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    Failure,
    /// Never started because a fail-fast combinator already failed.
    Skipped,
}

/// How the cache was involved in a stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    /// Stage is not cache-eligible, had no inputs, or never ran.
    Bypassed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub stage: TaskName,
    pub status: StageStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub cache: CacheOutcome,
    /// Number of transform operations actually executed.
    pub transforms_run: usize,
    /// Files written, relative to the project root.
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

impl StageResult {
    pub fn success(stage: impl Into<TaskName>, cache: CacheOutcome) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Success,
            diagnostics: Vec::new(),
            cache,
            transforms_run: 0,
            outputs: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn failure(stage: impl Into<TaskName>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            status: StageStatus::Failure,
            diagnostics,
            ..Self::success(stage, CacheOutcome::Bypassed)
        }
    }

    pub fn skipped(stage: impl Into<TaskName>, reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped,
            diagnostics: vec![Diagnostic::warning(reason)],
            ..Self::success(stage, CacheOutcome::Bypassed)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Failure
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
}

/// Outcome of one scheduler invocation for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub task: TaskName,
    /// Stage results in execution order; parallel siblings appear in
    /// declaration order.
    pub stages: Vec<StageResult>,
    pub status: RunStatus,
    pub duration: Duration,
}

impl RunResult {
    pub fn new(task: impl Into<TaskName>, stages: Vec<StageResult>, duration: Duration) -> Self {
        let status = if stages.iter().all(|s| s.status != StageStatus::Failure) {
            RunStatus::Success
        } else {
            RunStatus::Failure
        };
        Self {
            task: task.into(),
            stages,
            status,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn failed_stages(&self) -> impl Iterator<Item = &StageResult> {
        self.stages.iter().filter(|s| s.is_failure())
    }

    /// Every diagnostic paired with the stage that produced it.
    pub fn diagnostics(&self) -> impl Iterator<Item = (&str, &Diagnostic)> {
        self.stages
            .iter()
            .flat_map(|s| s.diagnostics.iter().map(move |d| (s.stage.as_str(), d)))
    }

    pub fn cache_hits(&self) -> usize {
        self.stages.iter().filter(|s| s.cache == CacheOutcome::Hit).count()
    }

    pub fn transforms_run(&self) -> usize {
        self.stages.iter().map(|s| s.transforms_run).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_failure_fails_the_run() {
        let run = RunResult::new(
            "styles",
            vec![
                StageResult::success("a", CacheOutcome::Miss),
                StageResult::failure("b", vec![Diagnostic::error("boom")]),
            ],
            Duration::ZERO,
        );
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(run.failed_stages().count(), 1);
        assert_eq!(run.diagnostics().next().map(|(s, _)| s), Some("b"));
    }

    #[test]
    fn warnings_and_empty_runs_succeed() {
        let mut ok = StageResult::success("a", CacheOutcome::Bypassed);
        ok.diagnostics.push(Diagnostic::warning("deprecated mixin"));
        assert!(RunResult::new("t", vec![ok], Duration::ZERO).is_success());
        assert!(RunResult::new("t", Vec::new(), Duration::ZERO).is_success());
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::error("unexpected }").in_file("css/app.scss").at_line(4);
        assert_eq!(d.to_string(), "css/app.scss:4: unexpected }");
    }
}
