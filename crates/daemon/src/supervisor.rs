// SPDX-License-Identifier: MIT

//! Restart loop for the always-on log-forwarder sidecar (SPEC_FULL.md §4.6).

use crate::config::LogForwarderConfig;
use crate::error::SupervisorError;
use isup_adapters::{execute, ExecuteOptions, NON_EXIT_CODE};
use isup_core::{ExecutorConfig, Runnable};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

const BACKOFF_FLOOR: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Runs longer than this reset backoff to the floor (SPEC_FULL.md §4.6).
const MAX_RESET_WINDOW: Duration = Duration::from_secs(60);

/// Exponential-with-cap backoff, doubling from a 1s floor.
pub fn backoff_for(attempt: u32) -> Duration {
    let millis = BACKOFF_FLOOR.as_millis().saturating_mul(1u128 << attempt.min(16));
    Duration::from_millis(millis.min(BACKOFF_CAP.as_millis()) as u64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Started,
    Stopped { exit_code: i32 },
}

/// Restart loop wrapping one always-on child process (the log-forwarder).
pub struct Supervisor {
    config: LogForwarderConfig,
    events: mpsc::UnboundedSender<SupervisorEvent>,
}

impl Supervisor {
    pub fn new(config: LogForwarderConfig, events: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        Self { config, events }
    }

    /// Build the forwarder's [`Runnable`] from the configured binary, plugin,
    /// and parsers paths.
    fn runnable(&self) -> Runnable {
        Runnable::new(
            self.config.binary.clone(),
            vec![
                "--plugin".to_string(),
                self.config.plugin.display().to_string(),
                "--parsers".to_string(),
                self.config.parsers.display().to_string(),
            ],
            ExecutorConfig::default(),
        )
    }

    /// Run the restart loop until `ctx` is cancelled, or `restart` fires a
    /// controlled recycle. Returns immediately if the sidecar isn't
    /// available (SPEC_FULL.md §6: all three paths must exist).
    pub async fn run(
        &self,
        ctx: CancellationToken,
        mut restart: mpsc::UnboundedReceiver<()>,
    ) -> Result<(), SupervisorError> {
        if !self.config.is_available() {
            return Err(SupervisorError::ForwarderUnavailable(
                self.config.binary.display().to_string(),
            ));
        }

        let mut attempt: u32 = 0;
        loop {
            if ctx.is_cancelled() {
                return Ok(());
            }

            let run_ctx = ctx.child_token();
            let _ = self.events.send(SupervisorEvent::Started);
            let started_at = Instant::now();
            let (exit_tx, exit_rx) = oneshot::channel();
            let opts = ExecuteOptions { exit_code_sink: Some(exit_tx), ..Default::default() };
            let recv = execute(run_ctx.clone(), &self.runnable(), opts);
            let drain = tokio::spawn(drain_to_exit_code(recv, exit_rx));

            let exit_code = tokio::select! {
                code = drain => code.unwrap_or(NON_EXIT_CODE),
                _ = restart.recv() => {
                    run_ctx.cancel();
                    NON_EXIT_CODE
                }
                _ = ctx.cancelled() => {
                    run_ctx.cancel();
                    return Ok(());
                }
            };
            let _ = self.events.send(SupervisorEvent::Stopped { exit_code });

            if exit_code == 0 || started_at.elapsed() > MAX_RESET_WINDOW {
                attempt = 0;
            } else {
                let delay = backoff_for(attempt);
                attempt = attempt.saturating_add(1);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancelled() => return Ok(()),
                }
            }
        }
    }
}

async fn drain_to_exit_code(mut recv: isup_adapters::OutputReceive, exit_rx: oneshot::Receiver<i32>) -> i32 {
    loop {
        tokio::select! {
            Some(_) = recv.stdout.recv() => {}
            Some(_) = recv.stderr.recv() => {}
            Some(e) = recv.errors.recv() => tracing::debug!(error = %e, "log-forwarder reported an error"),
            else => break,
        }
    }
    let _ = recv.done.await;
    exit_rx.await.unwrap_or(NON_EXIT_CODE)
}
