// SPDX-License-Identifier: MIT

//! Spawns a single external command, streams its output, enforces
//! cancellation, reports exit status (SPEC_FULL.md §4.1).

use crate::env::{build_child_env, EnvSource, OsEnvSource};
use crate::output::{output_channels, OutputReceive};
use isup_core::{ExecutorConfig, Runnable};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Sentinel exit code for spawn failures and other non-exit errors
/// (SPEC_FULL.md §6).
pub const NON_EXIT_CODE: i32 = -3;

/// Errors surfaced on an [`crate::OutputReceive::errors`] channel.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("error reading child output: {0}")]
    Io(#[source] std::io::Error),
    #[error("execution cancelled")]
    Cancelled,
    #[error("child exited with status {0}")]
    NonZeroExit(i32),
    #[error("child was killed by a signal")]
    Killed,
    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),
}

/// Optional sinks threaded through `execute` (SPEC_FULL.md §4.1 Contract).
#[derive(Default)]
pub struct ExecuteOptions {
    pub verbose: bool,
    pub pid_sink: Option<oneshot::Sender<u32>>,
    pub exit_code_sink: Option<oneshot::Sender<i32>>,
}

/// Start a child process asynchronously and return immediately with a
/// receive-view of its output channels (SPEC_FULL.md §4.1 Contract).
pub fn execute(ctx: CancellationToken, runnable: &Runnable, opts: ExecuteOptions) -> OutputReceive {
    execute_with_env(ctx, runnable, opts, &OsEnvSource)
}

/// Same as [`execute`] but with an injectable OS environment source, for
/// tests that must not depend on the real process environment.
pub fn execute_with_env(
    ctx: CancellationToken,
    runnable: &Runnable,
    opts: ExecuteOptions,
    os_env: &dyn EnvSource,
) -> OutputReceive {
    let (send, recv) = output_channels();
    let ExecuteOptions { verbose, pid_sink, exit_code_sink } = opts;

    let mut cmd = build_command(runnable, verbose, os_env);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(path = %runnable.path.display(), error = %e, "spawn failed");
            let _ = send.errors.send(ExecError::Spawn(e));
            if let Some(sink) = exit_code_sink {
                let _ = sink.send(NON_EXIT_CODE);
            }
            let _ = send.done.send(());
            return recv;
        }
    };

    tokio::spawn(run_to_completion(ctx, child, send, pid_sink, exit_code_sink));
    recv
}

fn build_command(runnable: &Runnable, verbose: bool, os_env: &dyn EnvSource) -> Command {
    let config = &runnable.executor_config;
    let env = build_child_env(os_env, config, verbose);

    let mut cmd = posix_user_wrapped_command(runnable, config);
    cmd.env_clear();
    cmd.envs(env);
    if !config.working_directory.as_os_str().is_empty() {
        cmd.current_dir(&config.working_directory);
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    cmd
}

#[cfg(unix)]
fn posix_user_wrapped_command(runnable: &Runnable, config: &ExecutorConfig) -> Command {
    match &config.user {
        Some(user) if !user.is_empty() => {
            match nix::unistd::User::from_name(user) {
                Ok(Some(_)) => {}
                Ok(None) => tracing::warn!(user, "no such local user; sudo invocation will fail"),
                Err(e) => tracing::warn!(user, error = %e, "failed to look up local user"),
            }
            // `sudo -n` fails immediately instead of prompting for a password
            // (SPEC_FULL.md §4.1).
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg("-u").arg(user).arg(&runnable.path).args(&runnable.args);
            cmd
        }
        _ => {
            let mut cmd = Command::new(&runnable.path);
            cmd.args(&runnable.args);
            cmd
        }
    }
}

#[cfg(not(unix))]
fn posix_user_wrapped_command(runnable: &Runnable, _config: &ExecutorConfig) -> Command {
    // `user` is ignored on non-POSIX hosts (SPEC_FULL.md §4.1); priority
    // inheritance is applied best-effort after spawn instead.
    let mut cmd = Command::new(&runnable.path);
    cmd.args(&runnable.args);
    cmd
}

async fn run_to_completion(
    ctx: CancellationToken,
    mut child: tokio::process::Child,
    send: crate::output::OutputSend,
    pid_sink: Option<oneshot::Sender<u32>>,
    exit_code_sink: Option<oneshot::Sender<i32>>,
) {
    if let Some(pid) = child.id() {
        if let Some(sink) = pid_sink {
            let _ = sink.send(pid);
        }
    }

    #[cfg(windows)]
    inherit_priority_best_effort(&child);

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = stdout.map(|pipe| tokio::spawn(stream_lines(pipe, send.stdout.clone())));
    let stderr_task = stderr.map(|pipe| tokio::spawn(stream_lines(pipe, send.stderr.clone())));

    // Drop our own clones immediately; only the reader tasks' clones (and,
    // for errors, our direct sender below) keep the channels open.
    drop(send.stdout);
    drop(send.stderr);

    let wait_result = tokio::select! {
        result = child.wait() => Outcome::Exited(result),
        _ = ctx.cancelled() => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "failed to kill child on cancellation");
            }
            Outcome::Cancelled(child.wait().await)
        }
    };

    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let exit_code = match wait_result {
        Outcome::Cancelled(_status) => {
            let _ = send.errors.send(ExecError::Cancelled);
            NON_EXIT_CODE
        }
        Outcome::Exited(Ok(status)) if status.success() => 0,
        Outcome::Exited(Ok(status)) => match status.code() {
            Some(code) => {
                let _ = send.errors.send(ExecError::NonZeroExit(code));
                code
            }
            None => {
                let _ = send.errors.send(ExecError::Killed);
                NON_EXIT_CODE
            }
        },
        Outcome::Exited(Err(e)) => {
            let _ = send.errors.send(ExecError::Wait(e));
            NON_EXIT_CODE
        }
    };

    if let Some(sink) = exit_code_sink {
        let _ = sink.send(exit_code);
    }

    drop(send.errors);
    let _ = send.done.send(());
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled(std::io::Result<std::process::ExitStatus>),
}

/// Read `\n`-delimited lines from a child pipe, stripping trailing CR/LF.
/// EOF is not an error; any residual bytes without a terminating newline are
/// emitted as one final line (SPEC_FULL.md §4.1 Streaming).
async fn stream_lines<R>(pipe: R, tx: tokio::sync::mpsc::UnboundedSender<Vec<u8>>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            // EOF: `read_until` already delivered any trailing bytes without a
            // terminating newline as the prior non-zero read, so a zero-sized
            // read means nothing is left (SPEC_FULL.md §4.1 Streaming).
            Ok(0) => break,
            Ok(_) => {
                while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                if tx.send(buf.clone()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "error reading child output pipe");
                break;
            }
        }
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn inherit_priority_best_effort(child: &tokio::process::Child) {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{
        GetCurrentProcess, GetPriorityClass, OpenProcess, SetPriorityClass,
        PROCESS_SET_INFORMATION,
    };

    let Some(pid) = child.id() else {
        return;
    };

    // SAFETY: plain FFI calls into documented Win32 APIs; no pointer
    // arithmetic on our side, and the opened handle is always closed below.
    unsafe {
        let priority = GetPriorityClass(GetCurrentProcess());
        if priority == 0 {
            tracing::warn!("failed to read agent priority class");
            return;
        }
        let handle = OpenProcess(PROCESS_SET_INFORMATION, 0, pid);
        if handle.is_null() {
            tracing::warn!(pid, "failed to open child process to set priority");
            return;
        }
        if SetPriorityClass(handle, priority) == 0 {
            tracing::warn!(pid, "failed to inherit priority class");
        }
        CloseHandle(handle);
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
