//! Process execution for apm-release.
//!
//! This crate runs the external tools the release lifecycle shells out to
//! (`apm`, `npm`). Two modes are provided:
//!
//! - [`run_command_in_dir`] captures output, for short probes such as `apm -v`.
//! - [`run_command_streaming`] forwards output to [`Sink`]s as it arrives, for
//!   long-running commands whose output the operator should see live.
//!
//! The environment passed to either function is layered over the current
//! process environment, and `PATH` lookup of `program` uses the layered value.
//!
//! # Example
//!
//! ```ignore
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use apm_release_process::{run_command_streaming, Sink};
//!
//! let out = Sink::memory();
//! let err = Sink::stderr();
//! let result = run_command_streaming("npm", &["--version"], Path::new("."), &BTreeMap::new(), &out, &err)
//!     .await?;
//! assert!(result.success);
//! ```

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

mod sink;

pub use sink::Sink;

/// Upper bound on the bytes of streamed output kept for diagnostics.
pub const MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code (if available)
    pub exit_code: Option<i32>,
    /// Standard output (for streamed commands, the trailing part only)
    pub stdout: String,
    /// Standard error (for streamed commands, the trailing part only)
    pub stderr: String,
}

impl CommandResult {
    /// Create a result from a process output
    pub fn from_output(output: &Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

fn command(program: &str, args: &[&str], dir: &Path, env: &BTreeMap<String, String>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .envs(env)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Run a command in `dir` with `env` layered over the process environment,
/// capturing its output.
///
/// Spawn failures (e.g. the program is not on `PATH`) are returned as errors;
/// a nonzero exit is reported through [`CommandResult::success`].
pub async fn run_command_in_dir(
    program: &str,
    args: &[&str],
    dir: &Path,
    env: &BTreeMap<String, String>,
) -> Result<CommandResult> {
    let output = command(program, args, dir, env)
        .output()
        .await
        .with_context(|| {
            format!(
                "failed to run command: {} {:?} in {}",
                program,
                args,
                dir.display()
            )
        })?;

    Ok(CommandResult::from_output(&output))
}

/// Run a command and forward its stdout/stderr to the given sinks chunk by
/// chunk while it runs. Returns once the process has exited.
///
/// The returned [`CommandResult`] holds at most [`MAX_CAPTURED_BYTES`] of the
/// end of each stream.
pub async fn run_command_streaming(
    program: &str,
    args: &[&str],
    dir: &Path,
    env: &BTreeMap<String, String>,
    stdout: &Sink,
    stderr: &Sink,
) -> Result<CommandResult> {
    let mut child = command(program, args, dir, env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| {
            format!(
                "failed to run command: {} {:?} in {}",
                program,
                args,
                dir.display()
            )
        })?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    // Both pipes are drained concurrently so neither can fill up and stall the child.
    let (stdout_tail, stderr_tail) = tokio::try_join!(
        forward(stdout_handle, stdout),
        forward(stderr_handle, stderr)
    )?;

    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to wait for command: {program}"))?;

    Ok(CommandResult {
        success: status.success(),
        exit_code: status.code(),
        stdout: String::from_utf8_lossy(&stdout_tail).to_string(),
        stderr: String::from_utf8_lossy(&stderr_tail).to_string(),
    })
}

async fn forward<R>(reader: Option<R>, sink: &Sink) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut tail = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(tail);
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .context("failed to read command output")?;
        if n == 0 {
            break;
        }

        sink.write_all(&buf[..n])
            .context("failed to forward command output")?;

        tail.extend_from_slice(&buf[..n]);
        if tail.len() > MAX_CAPTURED_BYTES {
            let excess = tail.len() - MAX_CAPTURED_BYTES;
            tail.drain(..excess);
        }
    }

    Ok(tail)
}

/// Get the full path to a command, resolving against `PATH` from `env` when it
/// is set there and from the process environment otherwise.
pub fn which_in(program: &str, env: &BTreeMap<String, String>, cwd: &Path) -> Option<PathBuf> {
    let paths = env
        .get("PATH")
        .map(OsString::from)
        .or_else(|| std::env::var_os("PATH"));
    which::which_in(program, paths, cwd).ok()
}

/// Check if a command exists on the (layered) `PATH`
pub fn command_exists_in(program: &str, env: &BTreeMap<String, String>, cwd: &Path) -> bool {
    which_in(program, env, cwd).is_some()
}
