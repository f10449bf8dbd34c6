// SPDX-License-Identifier: MIT

//! Periodic loop around one [`Definition`] (SPEC_FULL.md §4.3 Runner loop).

use crate::binder::DiscoveryBinder;
use crate::emitter::PayloadEmitter;
use crate::run::{run, RunOptions};
use crate::severity;
use crate::when::{self, FeatureFlagSource};
use isup_adapters::{ExecError, OutputReceive};
use isup_core::Definition;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Wraps one [`Definition`], evaluating `when_conditions` and re-running it
/// on its resolved interval until cancelled (SPEC_FULL.md §4.3).
pub struct Runner {
    definition: Definition,
    binder: Option<Arc<dyn DiscoveryBinder>>,
    emitter: Arc<dyn PayloadEmitter>,
    flags: Arc<dyn FeatureFlagSource>,
}

impl Runner {
    pub fn new(
        definition: Definition,
        binder: Option<Arc<dyn DiscoveryBinder>>,
        emitter: Arc<dyn PayloadEmitter>,
        flags: Arc<dyn FeatureFlagSource>,
    ) -> Self {
        Self { definition, binder, emitter, flags }
    }

    /// Run the loop until `ctx` is cancelled, or once if the resolved
    /// interval is zero (single-shot, per SPEC_FULL.md §4.3 Interval clamp).
    pub async fn run_loop(&self, ctx: CancellationToken) {
        loop {
            if ctx.is_cancelled() {
                return;
            }

            if when::evaluate(&self.definition.when_conditions, self.flags.as_ref()) {
                self.run_once(ctx.clone(), None, None).await;
            } else {
                tracing::debug!(name = %self.definition.name, "when_conditions not satisfied, skipping run");
            }

            if self.definition.interval.is_zero() {
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.definition.interval) => {}
                _ = ctx.cancelled() => return,
            }
        }
    }

    /// Single ad-hoc execution bypassing `when_conditions`, for command-channel
    /// requests that need a pid/exit-code handed back to a [`crate::Runner`]'s
    /// caller for `Tracker` bookkeeping (SPEC_FULL.md §4.5 Command-channel
    /// requests). Only meaningful for the no-binder single-execution path;
    /// fan-out runs ignore both sinks, same as the periodic loop.
    pub async fn run_single(
        &self,
        ctx: CancellationToken,
        pid_sink: Option<oneshot::Sender<u32>>,
        exit_code_sink: Option<oneshot::Sender<i32>>,
    ) {
        self.run_once(ctx, pid_sink, exit_code_sink).await;
    }

    /// One Definition.Run call, under a single per-run deadline covering
    /// every spawned execution together (SPEC_FULL.md §4.3 Timeout
    /// semantics: "a per-run deadline context is used").
    async fn run_once(
        &self,
        ctx: CancellationToken,
        pid_sink: Option<oneshot::Sender<u32>>,
        exit_code_sink: Option<oneshot::Sender<i32>>,
    ) {
        let run_ctx = ctx.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let watcher = self.definition.timeout.map(|timeout| {
            let watch_ctx = run_ctx.clone();
            let flag = Arc::clone(&timed_out);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        flag.store(true, Ordering::SeqCst);
                        watch_ctx.cancel();
                    }
                    _ = watch_ctx.cancelled() => {}
                }
            })
        });

        let opts = RunOptions { verbose: false, pid_sink, exit_code_sink };
        let receives = match run(&self.definition, run_ctx.clone(), self.binder.as_deref(), opts) {
            Ok(receives) => receives,
            Err(e) => {
                tracing::warn!(name = %self.definition.name, error = %e, "run failed to start");
                run_ctx.cancel();
                if let Some(watcher) = watcher {
                    let _ = watcher.await;
                }
                return;
            }
        };

        let mut handles = Vec::with_capacity(receives.len());
        for matched in receives {
            let name = self.definition.name.clone();
            // Per-match labels extend/override the Definition's own, so a
            // discovery match can tag its payload beyond what's static in
            // the config (SPEC_FULL.md §4.3 step 2).
            let mut labels = self.definition.labels.clone();
            labels.extend(matched.labels);
            let emitter = Arc::clone(&self.emitter);
            let timed_out = Arc::clone(&timed_out);
            handles.push(tokio::spawn(consume(name, labels, matched.entity_rewrite, matched.receive, emitter, timed_out)));
        }

        for handle in handles {
            let _ = handle.await;
        }

        // Wake the watcher if the run finished before the deadline.
        run_ctx.cancel();
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }
    }
}

async fn consume(
    name: String,
    labels: std::collections::HashMap<String, String>,
    entity_rewrite: Option<String>,
    mut recv: OutputReceive,
    emitter: Arc<dyn PayloadEmitter>,
    timed_out: Arc<AtomicBool>,
) {
    let mut payload = Vec::new();
    loop {
        tokio::select! {
            Some(line) = recv.stdout.recv() => {
                payload.extend_from_slice(&line);
                payload.push(b'\n');
            }
            Some(line) = recv.stderr.recv() => severity::log(&name, &line),
            Some(e) = recv.errors.recv() => {
                if matches!(e, ExecError::Cancelled) && timed_out.load(Ordering::SeqCst) {
                    tracing::warn!(name, "run timed out");
                } else {
                    tracing::warn!(name, error = %e, "run reported an error");
                }
            }
            else => break,
        }
    }
    let _ = recv.done.await;

    if !payload.is_empty() {
        emitter.emit(&name, &labels, entity_rewrite.as_deref(), payload);
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
