// src/exec/process.rs

//! Shell process runner used by the `command` transform.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Run `cmd` through the platform shell in `cwd`, feeding `stdin` and
/// capturing both output streams.
///
/// The child is killed if the returned future is dropped.
pub async fn run_shell(
    cmd: &str,
    cwd: &Path,
    stdin: Vec<u8>,
    env: &[(&str, String)],
) -> Result<ProcessOutput> {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning `{cmd}`"))?;

    // Feed stdin from a separate task so a tool that writes before it has
    // read everything cannot deadlock us.
    let writer = child.stdin.take().map(|mut pipe| {
        tokio::spawn(async move {
            let res = pipe.write_all(&stdin).await;
            drop(pipe);
            res
        })
    });

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for `{cmd}`"))?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            // Tools that ignore stdin close the pipe early.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => warn!(cmd, error = %e, "failed to write process stdin"),
            Err(e) => warn!(cmd, error = %e, "stdin writer task failed"),
        }
    }

    debug!(
        cmd,
        code = ?output.status.code(),
        stdout_bytes = output.stdout.len(),
        stderr_bytes = output.stderr.len(),
        "process exited"
    );

    Ok(ProcessOutput {
        code: output.status.code(),
        success: output.status.success(),
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipes_stdin_to_stdout() {
        let out = run_shell("tr a-z A-Z", Path::new("."), b"body".to_vec(), &[])
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, b"BODY");
    }

    #[tokio::test]
    async fn reports_failure_and_stderr() {
        let out = run_shell("echo broken >&2; exit 3", Path::new("."), Vec::new(), &[])
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stderr.trim(), "broken");
    }

    #[tokio::test]
    async fn exports_environment() {
        let env = [("ASSETFLOW_ENV", "production".to_string())];
        let out = run_shell("printf %s \"$ASSETFLOW_ENV\"", Path::new("."), Vec::new(), &env)
            .await
            .unwrap();
        assert_eq!(out.stdout, b"production");
    }
}
