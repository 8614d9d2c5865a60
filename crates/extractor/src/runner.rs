//! Single-stage subprocess execution.
//!
//! Runs one external process, demuxes its stdout and stderr into lines as
//! they arrive, and hands each line to a caller-supplied callback while the
//! process is still running. The readers drain the child's pipes into an
//! unbounded channel, so a slow consumer downstream can never back up into
//! the child and stall it on a full pipe buffer.

use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record_reader::LineReader;

/// How one stage's process ended.
///
/// A non-zero exit is a normal result here, not an error: the orchestrator
/// decides what it means, using the accumulated stderr as the failure
/// message.
#[derive(Debug)]
pub struct StageExit {
    pub code: Option<i32>,
    pub stderr: String,
}

impl StageExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Accumulated stderr, or the given fallback when the process was silent.
    pub fn stderr_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let trimmed = self.stderr.trim();
        if trimmed.is_empty() { fallback } else { trimmed }
    }
}

enum StageLine {
    Stdout(String),
    Stderr(String),
}

/// Run one external process to completion, invoking `on_stdout` / `on_stderr`
/// for every demuxed line as it becomes available.
///
/// Failure to spawn at all (missing or unexecutable binary) is the distinct
/// [`Error::Launch`]; cancellation kills the child and yields
/// [`Error::Cancelled`].
pub async fn run_stage<F, G>(
    program: &str,
    args: &[String],
    cancel: &CancellationToken,
    mut on_stdout: F,
    mut on_stderr: G,
) -> Result<StageExit>
where
    F: FnMut(&str),
    G: FnMut(&str),
{
    debug!(program, ?args, "spawning stage process");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Launch {
            program: program.to_string(),
            source,
        })?;

    let (tx, mut rx) = mpsc::unbounded_channel();

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut reader = LineReader::new(stdout);
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(StageLine::Stdout(line)).is_err() {
                    break;
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut reader = LineReader::new(stderr);
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(StageLine::Stderr(line)).is_err() {
                    break;
                }
            }
        });
    }

    // The reader tasks hold the remaining senders; the channel closes when
    // both pipes hit EOF.
    drop(tx);

    let mut stderr_buf = String::new();

    // Dispatch lines live until both pipe readers finish (channel closed).
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(program, "stage cancelled, killing process");
                let _ = child.kill().await;
                return Err(Error::Cancelled);
            }
            line = rx.recv() => match line {
                Some(StageLine::Stdout(line)) => on_stdout(&line),
                Some(StageLine::Stderr(line)) => {
                    if !line.trim().is_empty() {
                        if !stderr_buf.is_empty() {
                            stderr_buf.push('\n');
                        }
                        stderr_buf.push_str(&line);
                    }
                    on_stderr(&line);
                }
                None => break,
            }
        }
    }

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(Error::Cancelled);
        }
        status = child.wait() => status?,
    };

    let code = status.code();
    if code != Some(0) {
        warn!(program, ?code, "stage process exited non-zero");
    }

    Ok(StageExit {
        code,
        stderr: stderr_buf,
    })
}
