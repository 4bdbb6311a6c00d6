//! Cancellable external command execution
//!
//! Every system tool an applier invokes goes through this module so the
//! transaction's cancellation context reaches the child process: the
//! runner polls the child and kills it once the context is cancelled or
//! past its deadline.

use crate::ctx::ApplyContext;
use netforge_core::errors::{apply_error, Error, Result};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

/// How often the runner polls a child for exit or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a command execution
#[derive(Debug)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Run a command under the context; non-zero exit is an error
///
/// The error carries the command name and trimmed stderr.
pub fn run_checked(ctx: &ApplyContext, program: &str, args: &[&str]) -> Result<CmdOutput> {
    let output = run(ctx, program, args)?;
    if !output.success {
        return Err(apply_error(
            program,
            format!(
                "exit {}: {}",
                output.code.unwrap_or(-1),
                output.stderr.trim()
            ),
        ));
    }
    Ok(output)
}

/// Run a command under the context, tolerating a non-zero exit
///
/// Spawn failures and cancellation still error.
pub fn run_unchecked(ctx: &ApplyContext, program: &str, args: &[&str]) -> Result<CmdOutput> {
    run(ctx, program, args)
}

/// Run a command with bytes fed to its stdin; non-zero exit is an error
pub fn run_with_stdin(
    ctx: &ApplyContext,
    program: &str,
    args: &[&str],
    input: &str,
) -> Result<CmdOutput> {
    let mut child = spawn(program, args, true)?;

    // Feed stdin from a thread so a child that exits early cannot stall
    // the writer against a full pipe.
    let stdin = child.stdin.take();
    let payload = input.as_bytes().to_vec();
    let writer = thread::spawn(move || {
        if let Some(mut stdin) = stdin {
            let _ = stdin.write_all(&payload);
        }
    });

    let output = supervise(ctx, program, child);
    let _ = writer.join();

    let output = output?;
    if !output.success {
        return Err(apply_error(
            program,
            format!(
                "exit {}: {}",
                output.code.unwrap_or(-1),
                output.stderr.trim()
            ),
        ));
    }
    Ok(output)
}

/// Run a command under the context and collect its output
pub fn run(ctx: &ApplyContext, program: &str, args: &[&str]) -> Result<CmdOutput> {
    let child = spawn(program, args, false)?;
    supervise(ctx, program, child)
}

fn spawn(program: &str, args: &[&str], piped_stdin: bool) -> Result<Child> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if piped_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    cmd.spawn()
        .map_err(|e| apply_error(program, format!("failed to execute: {e}")))
}

/// Poll the child until it exits or the context fires
///
/// Output pipes are drained on reader threads so a chatty child cannot
/// deadlock against a full pipe buffer while we wait.
fn supervise(ctx: &ApplyContext, program: &str, mut child: Child) -> Result<CmdOutput> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) => {}
            Err(e) => break Err(apply_error(program, format!("wait failed: {e}"))),
        }

        if ctx.deadline_exceeded() || ctx.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_reader.join();
            let _ = stderr_reader.join();
            tracing::debug!(command = %program, "killed command on context cancellation");
            return Err(if ctx.deadline_exceeded() {
                Error::Timeout
            } else {
                Error::Cancelled
            });
        }

        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    let status = status?;

    Ok(CmdOutput {
        stdout,
        stderr,
        success: status.success(),
        code: status.code(),
    })
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).to_string()
}
