//! Bounded process runner.
//!
//! Runs one external command with a hard deadline. The child's stdout and
//! stderr are drained line by line while a timer and a cancellation signal
//! race the drain; whichever finishes first decides the outcome, and the
//! losers are torn down. A timed-out or cancelled child is killed, never
//! orphaned.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One command to run, already split into program + arguments.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl RunSpec {
    /// Run `command_line` through the platform shell.
    pub fn shell(command_line: &str, timeout: Duration) -> Self {
        let (program, flag) = shell_invocation();
        RunSpec {
            program: program.to_string(),
            args: vec![flag.to_string(), command_line.to_string()],
            dir: None,
            env: BTreeMap::new(),
            timeout,
        }
    }
}

#[cfg(unix)]
fn shell_invocation() -> (&'static str, &'static str) {
    ("sh", "-c")
}

#[cfg(windows)]
fn shell_invocation() -> (&'static str, &'static str) {
    ("cmd", "/C")
}

/// How the race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The command ran to completion before the deadline.
    Completed { exit_code: Option<i32> },
    /// The deadline elapsed first; the child was killed.
    TimedOut,
    /// Shutdown was requested first; the child was killed.
    Cancelled,
}

/// Captured output plus the outcome of the race.
#[derive(Debug)]
pub struct RunTranscript {
    pub status: RunStatus,
    /// Stdout and stderr lines, in arrival order.
    pub lines: Vec<String>,
    pub elapsed: Duration,
}

/// Run the command, capturing output until it exits, times out, or is
/// cancelled. `tee` optionally mirrors the transcript to a live log file;
/// a tee that cannot be opened is skipped, it must not block the build.
pub async fn run_command(
    spec: &RunSpec,
    tee: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<RunTranscript> {
    let mut cmd = tokio::process::Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {}", spec.program))?;
    let stdout = child
        .stdout
        .take()
        .context("child stdout was not captured")?;
    let stderr = child
        .stderr
        .take()
        .context("child stderr was not captured")?;

    let mut tee_writer = tee.and_then(open_tee);
    let mut lines = Vec::new();
    let status = tokio::select! {
        drained = drain(stdout, stderr, &mut lines, &mut tee_writer) => {
            drained?;
            let exit = child.wait().await.context("waiting for child")?;
            RunStatus::Completed { exit_code: exit.code() }
        }
        _ = tokio::time::sleep(spec.timeout) => {
            child.kill().await.ok();
            RunStatus::TimedOut
        }
        _ = cancel.cancelled() => {
            child.kill().await.ok();
            RunStatus::Cancelled
        }
    };
    if let Some(writer) = tee_writer.as_mut() {
        let _ = writer.flush();
    }
    debug!(program = %spec.program, ?status, lines = lines.len(), "command finished");
    Ok(RunTranscript {
        status,
        lines,
        elapsed: started.elapsed(),
    })
}

fn open_tee(path: &Path) -> Option<std::io::BufWriter<std::fs::File>> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    std::fs::File::create(path).ok().map(std::io::BufWriter::new)
}

/// Read both streams to EOF, merging lines in arrival order.
async fn drain(
    stdout: ChildStdout,
    stderr: ChildStderr,
    lines: &mut Vec<String>,
    tee: &mut Option<std::io::BufWriter<std::fs::File>>,
) -> Result<()> {
    let mut out = BufReader::new(stdout).lines();
    let mut err = BufReader::new(stderr).lines();
    let mut out_done = false;
    let mut err_done = false;
    while !(out_done && err_done) {
        let next = tokio::select! {
            n = out.next_line(), if !out_done => match n.context("reading child stdout")? {
                Some(line) => Some(line),
                None => {
                    out_done = true;
                    None
                }
            },
            n = err.next_line(), if !err_done => match n.context("reading child stderr")? {
                Some(line) => Some(line),
                None => {
                    err_done = true;
                    None
                }
            },
        };
        if let Some(line) = next {
            if let Some(writer) = tee.as_mut() {
                let _ = writeln!(writer, "{line}");
            }
            lines.push(line);
        }
    }
    Ok(())
}
