// SPDX-License-Identifier: MIT

//! Demo binary wiring `isup-daemon`'s Manager and Supervisor into one
//! standalone process (SPEC_FULL.md §2 "Demo binary / ambient stack").
//!
//! This is the minimal ambient shell around the `isup-*` library workspace:
//! a host-telemetry agent embedding the core would replace this binary with
//! its own process, its own `PayloadEmitter`, and its own `FeatureFlagSource`.

use clap::Parser;
use isup_adapters::{purge_oldest_beyond_cap, OsTempFileFactory};
use isup_daemon::{channel_pair, Manager, RealFsWatcher, SupervisorConfig};
use isup_engine::{AllFlagsEnabled, NoopEmitter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const TEMP_FILE_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "isupd", about = "Integration supervisor core, standalone")]
struct Cli {
    /// Path to the daemon's TOML configuration file.
    #[arg(short, long, default_value = "/etc/isup/isupd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match SupervisorConfig::from_toml_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let ctx = CancellationToken::new();
    let temp_file_factory = Arc::new(OsTempFileFactory::default());
    let manager = Arc::new(Manager::new(
        config.limits.clone(),
        temp_file_factory,
        Arc::new(NoopEmitter),
        Arc::new(AllFlagsEnabled),
    ));

    let mut watcher = match RealFsWatcher::new() {
        Ok(watcher) => Box::new(watcher),
        Err(e) => {
            tracing::error!(error = %e, "failed to start filesystem watcher");
            return ExitCode::FAILURE;
        }
    };
    manager.bootstrap(&config.watch_dirs, watcher.as_mut());
    let (queues, _handles) = channel_pair();

    let manager_task = {
        let manager = Arc::clone(&manager);
        let ctx = ctx.child_token();
        tokio::spawn(async move { manager.run(ctx, watcher, queues).await })
    };

    let purge_task = {
        let ctx = ctx.child_token();
        let cap = config.temp_file_purge_cap;
        tokio::spawn(purge_loop(ctx, std::env::temp_dir(), cap))
    };

    let supervisor_task = spawn_supervisor(ctx.child_token(), config.log_forwarder.clone());

    wait_for_signal().await;
    tracing::info!("shutting down");
    ctx.cancel();

    let _ = manager_task.await;
    let _ = purge_task.await;
    if let Some(supervisor_task) = supervisor_task {
        let _ = supervisor_task.await;
    }

    ExitCode::SUCCESS
}

/// Spawns the log-forwarder sidecar's restart loop, if configured. Returns
/// `None` when the forwarder's paths aren't all present, matching
/// `Supervisor::run`'s own availability check (SPEC_FULL.md §6).
fn spawn_supervisor(
    ctx: CancellationToken,
    config: isup_daemon::LogForwarderConfig,
) -> Option<tokio::task::JoinHandle<()>> {
    if !config.is_available() {
        tracing::info!("log-forwarder sidecar not configured, skipping");
        return None;
    }

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let (_restart_tx, restart_rx) = tokio::sync::mpsc::unbounded_channel();
    let supervisor = isup_daemon::Supervisor::new(config, events_tx);

    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            tracing::info!(?event, "log-forwarder sidecar event");
        }
    });

    Some(tokio::spawn(async move {
        if let Err(e) = supervisor.run(ctx, restart_rx).await {
            tracing::error!(error = %e, "log-forwarder sidecar exited");
        }
    }))
}

async fn purge_loop(ctx: CancellationToken, dir: PathBuf, cap: usize) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(TEMP_FILE_PURGE_INTERVAL) => {
                match purge_oldest_beyond_cap(&dir, cap) {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "purged stale temp files"),
                    Err(e) => tracing::warn!(error = %e, "temp file purge failed"),
                }
            }
            _ = ctx.cancelled() => return,
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler, watching SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
