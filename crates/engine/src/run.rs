// SPDX-License-Identifier: MIT

//! `Definition::run` (SPEC_FULL.md §4.3): spawn one execution, or fan out
//! across discovery matches when a [`DiscoveryBinder`] is supplied.

use crate::binder::{interpolate, references_config_path, DiscoveryBinder};
use crate::error::RunnerError;
use isup_adapters::{execute, ExecuteOptions, OutputReceive};
use isup_core::{Definition, Hasher, TempFileFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Sinks only meaningful for the single-execution path (no discovery
/// binder): a fan-out across matches spawns more than one child, so no
/// single sink could receive all of their pids/exit codes.
#[derive(Default)]
pub struct RunOptions {
    pub verbose: bool,
    pub pid_sink: Option<oneshot::Sender<u32>>,
    pub exit_code_sink: Option<oneshot::Sender<i32>>,
}

/// One spawned execution's output channels, paired with the per-match label
/// overrides and entity-rewrite directive the binder attached to it
/// (SPEC_FULL.md §4.3 step 2: "Each match carries a value map plus optional
/// extra labels and entity-rewrite rules"). The no-binder path reports empty
/// labels and no entity rewrite, since there's no match to carry them.
pub struct MatchedOutput {
    pub labels: HashMap<String, String>,
    pub entity_rewrite: Option<String>,
    pub receive: OutputReceive,
}

/// Run `def` once. Without a binder, spawns exactly one execution of
/// `def.runnable`. With a binder, fans out across every match it returns,
/// materialising `config_template` and substituting `${var}` references per
/// match (SPEC_FULL.md §4.3 steps 1-4).
pub fn run(
    def: &Definition,
    ctx: CancellationToken,
    binder: Option<&dyn DiscoveryBinder>,
    opts: RunOptions,
) -> Result<Vec<MatchedOutput>, RunnerError> {
    let Some(binder) = binder else {
        let exec_opts = ExecuteOptions {
            verbose: opts.verbose,
            pid_sink: opts.pid_sink,
            exit_code_sink: opts.exit_code_sink,
        };
        let receive = execute(ctx, &def.runnable, exec_opts);
        return Ok(vec![MatchedOutput { labels: HashMap::new(), entity_rewrite: None, receive }]);
    };

    let matches = binder.matches(def);
    if matches.is_empty() {
        return Ok(Vec::new());
    }

    let mut receives = Vec::with_capacity(matches.len());
    for m in matches {
        let mut runnable = def.runnable.clone();

        if let Some(template) = &def.config_template {
            let rendered = substitute_bytes(template, &m.values);
            let key = dedup_key(&rendered, &m.values);
            let temp = def
                .temp_file_factory
                .create(&key, &rendered)
                .map_err(RunnerError::TempFile)?;

            let placeholder_used = references_config_path(runnable.args.iter())
                || references_config_path(runnable.executor_config.environment.values());

            let mut values = m.values.clone();
            values.insert("config.path".to_string(), temp.path.display().to_string());
            for arg in runnable.args.iter_mut() {
                *arg = interpolate(arg, &values);
            }
            for value in runnable.executor_config.environment.values_mut() {
                *value = interpolate(value, &values);
            }
            if !placeholder_used {
                runnable
                    .executor_config
                    .environment
                    .insert("CONFIG_PATH".to_string(), temp.path.display().to_string());
            }

            let factory = Arc::clone(&def.temp_file_factory);
            let recv = execute(ctx.clone(), &runnable, ExecuteOptions { verbose: opts.verbose, ..Default::default() });
            let receive = with_cleanup(recv, move || {
                if let Err(e) = factory.remove(&temp) {
                    tracing::warn!(path = %temp.path.display(), error = %e, "failed to remove temp file");
                }
            });
            receives.push(MatchedOutput { labels: m.extra_labels.clone(), entity_rewrite: m.entity_rewrite.clone(), receive });
        } else {
            for arg in runnable.args.iter_mut() {
                *arg = interpolate(arg, &m.values);
            }
            for value in runnable.executor_config.environment.values_mut() {
                *value = interpolate(value, &m.values);
            }
            let receive = execute(ctx.clone(), &runnable, ExecuteOptions { verbose: opts.verbose, ..Default::default() });
            receives.push(MatchedOutput { labels: m.extra_labels.clone(), entity_rewrite: m.entity_rewrite.clone(), receive });
        }
    }

    Ok(receives)
}

fn substitute_bytes(template: &[u8], values: &HashMap<String, String>) -> Vec<u8> {
    match std::str::from_utf8(template) {
        Ok(text) => interpolate(text, values).into_bytes(),
        Err(_) => template.to_vec(),
    }
}

/// Deterministic name so identical (template, values) pairs reuse one temp
/// file instead of racing to create distinct ones (SPEC_FULL.md §9 Open
/// Question: temp-file collisions).
fn dedup_key(rendered: &[u8], values: &HashMap<String, String>) -> String {
    let mut h = Hasher::new();
    h.update(rendered);
    let mut sorted: Vec<_> = values.iter().collect();
    sorted.sort_by_key(|(k, _)| k.as_str());
    for (k, v) in sorted {
        h.update_field(k, v);
    }
    h.finish_hex()
}

/// Tee an [`OutputReceive`] through a forwarding task that runs `on_done`
/// once the upstream `done` signal fires, then re-signals a fresh `done` to
/// the caller (SPEC_FULL.md §3 "temp files ... deleted when the spawned
/// command's done-signal fires").
fn with_cleanup(mut recv: OutputReceive, on_done: impl FnOnce() + Send + 'static) -> OutputReceive {
    let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
    let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(line) = recv.stdout.recv() => { let _ = stdout_tx.send(line); }
                Some(line) = recv.stderr.recv() => { let _ = stderr_tx.send(line); }
                Some(e) = recv.errors.recv() => { let _ = errors_tx.send(e); }
                else => break,
            }
        }
        let _ = recv.done.await;
        on_done();
        let _ = done_tx.send(());
    });

    OutputReceive { stdout: stdout_rx, stderr: stderr_rx, errors: errors_rx, done: done_rx }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
