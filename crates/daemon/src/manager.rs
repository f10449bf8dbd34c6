// SPDX-License-Identifier: MIT

//! Path → GroupContext registry and dispatch loop (SPEC_FULL.md §4.5).

use crate::error::{LoadError, ManagerError};
use crate::tracker::Tracker;
use crate::watcher::{FsEvent, FsEventKind, FsWatcher};
use crate::yaml;
use isup_cache::Cache;
use isup_core::{Definition, DurationLimits, TempFileFactory};
use isup_engine::{DiscoveryBinder, FeatureFlagSource, Group, PayloadEmitter, Runner};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Configuration/Lifecycle errors never propagate out of the dispatch loop
/// (SPEC_FULL.md §7 Policy): log at `warn` with the file name and continue.
fn log_manager_error(err: ManagerError) {
    tracing::warn!(error = %err, "manager error");
}

/// A one-off ad-hoc execution requested on `definitionQueue`.
pub struct DefinitionRequest {
    pub definition: Definition,
}

/// A discovery-driven configuration entry requested on `configEntryQueue`.
pub struct ConfigEntryRequest {
    pub definition: Definition,
    pub binder: Arc<dyn DiscoveryBinder>,
}

/// Senders for the Manager's three inbound queues (SPEC_FULL.md §4.5 State).
pub struct ManagerHandles {
    pub definitions: mpsc::UnboundedSender<DefinitionRequest>,
    pub config_entries: mpsc::UnboundedSender<ConfigEntryRequest>,
    pub terminations: mpsc::UnboundedSender<String>,
}

/// Receiver half of the same three queues, consumed by [`Manager::run`].
pub struct ManagerQueues {
    definitions: mpsc::UnboundedReceiver<DefinitionRequest>,
    config_entries: mpsc::UnboundedReceiver<ConfigEntryRequest>,
    terminations: mpsc::UnboundedReceiver<String>,
}

/// Create the paired sender/receiver halves of the Manager's three
/// command-channel queues.
pub fn channel_pair() -> (ManagerQueues, ManagerHandles) {
    let (d_tx, d_rx) = mpsc::unbounded_channel();
    let (c_tx, c_rx) = mpsc::unbounded_channel();
    let (t_tx, t_rx) = mpsc::unbounded_channel();
    (
        ManagerQueues { definitions: d_rx, config_entries: c_rx, terminations: t_rx },
        ManagerHandles { definitions: d_tx, config_entries: c_tx, terminations: t_tx },
    )
}

/// Owns every running [`Group`], keyed by the config path it was loaded
/// from, plus the command-channel queues and the [`Tracker`] for ad-hoc
/// runs (SPEC_FULL.md §4.5). Each path's membership is reconciled through a
/// shared [`Cache`] (SPEC_FULL.md §4.2), so a reload diffs against the
/// previously-installed definitions for that path rather than blindly
/// replacing them.
pub struct Manager {
    groups: RwLock<HashMap<PathBuf, Arc<Group>>>,
    cache: Arc<Cache>,
    tracker: Arc<Tracker>,
    limits: DurationLimits,
    temp_file_factory: Arc<dyn TempFileFactory>,
    emitter: Arc<dyn PayloadEmitter>,
    flags: Arc<dyn FeatureFlagSource>,
}

impl Manager {
    pub fn new(
        limits: DurationLimits,
        temp_file_factory: Arc<dyn TempFileFactory>,
        emitter: Arc<dyn PayloadEmitter>,
        flags: Arc<dyn FeatureFlagSource>,
    ) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            cache: Arc::new(Cache::new()),
            tracker: Arc::new(Tracker::new()),
            limits,
            temp_file_factory,
            emitter,
            flags,
        }
    }

    pub fn group_paths(&self) -> Vec<PathBuf> {
        self.groups.read().keys().cloned().collect()
    }

    pub fn is_running(&self, path: &Path) -> bool {
        self.groups.read().get(path).map(|g| g.is_running()).unwrap_or(false)
    }

    fn load_file(&self, path: &Path) -> Result<Definition, LoadError> {
        let yaml = std::fs::read_to_string(path)?;
        yaml::parse_definition(&yaml, &self.limits, Arc::clone(&self.temp_file_factory))
    }

    fn stop_and_remove(&self, path: &Path) {
        if let Some(group) = self.groups.write().remove(path) {
            group.stop();
        }
    }

    /// Drop every hash the Cache has installed for `path`'s config name,
    /// e.g. once its file is gone for good (SPEC_FULL.md §4.2 ApplyConfig).
    fn clear_cache(&self, path: &Path) {
        let empty = self.cache.take_config(path.display().to_string());
        self.cache.apply_config(empty);
    }

    /// Diff `definition` into the Cache entry for `path`'s config name and
    /// (re)start a Group over whatever that config name now holds. Reusing
    /// `Cache.ApplyConfig` here, rather than just replacing the Group
    /// outright, means a file that declares the same semantic definition
    /// across two successive writes keeps its identity (same hash, no
    /// spurious removal) instead of always diffing against nothing.
    fn install_and_start(&self, path: &Path, definition: Definition) {
        let config_name = path.display().to_string();
        let mut cfg_defs = self.cache.take_config(config_name.clone());
        cfg_defs.add(definition);
        self.cache.apply_config(cfg_defs);

        let definitions = self.cache.get_definitions(&config_name);
        let group = Arc::new(Group::new(definitions, None, Arc::clone(&self.emitter), Arc::clone(&self.flags)));
        group.start();
        self.groups.write().insert(path.to_path_buf(), group);
    }

    /// Load `path` and, on success, install and start a Group for it. Failure
    /// is a Configuration error (SPEC_FULL.md §7): logged at `warn` with the
    /// file name, no group is installed and the Cache entry for this path is
    /// cleared so it doesn't linger after the group it backed is gone.
    fn load_and_install(&self, path: &Path) {
        match self.load_file(path) {
            Ok(definition) => self.install_and_start(path, definition),
            Err(source) => {
                log_manager_error(ManagerError::Load { path: path.display().to_string(), source });
                self.clear_cache(path);
            }
        }
    }

    fn watch(&self, watcher: &mut dyn FsWatcher, path: &Path) {
        if let Err(source) = watcher.watch(path) {
            log_manager_error(ManagerError::Watch { path: path.display().to_string(), source });
        }
    }

    /// Enumerate each configured directory, load every integration YAML file
    /// found, watch the directory and each file, and start a Group for every
    /// valid config (SPEC_FULL.md §4.5 Lifecycle).
    pub fn bootstrap(&self, watch_dirs: &[PathBuf], watcher: &mut dyn FsWatcher) {
        for dir in watch_dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(source) => {
                    log_manager_error(ManagerError::Io { path: dir.display().to_string(), source });
                    continue;
                }
            };
            self.watch(watcher, dir);
            for entry in entries.flatten() {
                let path = entry.path();
                if yaml::looks_like_integration_yaml(&path) {
                    self.watch(watcher, &path);
                    self.load_and_install(&path);
                }
            }
        }
    }

    /// Apply one filesystem event (SPEC_FULL.md §4.5 FS event handling).
    pub fn handle_fs_event(&self, event: FsEvent, watcher: &mut dyn FsWatcher) {
        if event.path.as_os_str().is_empty() || !yaml::looks_like_integration_yaml(&event.path) {
            return;
        }

        match event.kind {
            FsEventKind::Remove | FsEventKind::Rename => {
                self.stop_and_remove(&event.path);
                // Some editors emit remove-then-recreate; re-add to the
                // watcher and reload if the file is actually still there.
                if event.path.exists() {
                    self.watch(watcher, &event.path);
                    self.load_and_install(&event.path);
                } else {
                    self.clear_cache(&event.path);
                }
            }
            FsEventKind::Create | FsEventKind::Write => {
                self.stop_and_remove(&event.path);
                self.load_and_install(&event.path);
            }
            FsEventKind::Other => {}
        }
    }

    /// Spin up a Runner for a one-off Definition under a tracked
    /// sub-context; if it carries a command-hash, register it in the
    /// Tracker and unregister once it completes (SPEC_FULL.md §4.5
    /// Command-channel requests).
    pub fn handle_definition_request(&self, ctx: &CancellationToken, request: DefinitionRequest) {
        self.spawn_ad_hoc(ctx, request.definition, None);
    }

    /// Same as a one-off Definition, but driven through the discovery
    /// databinding attached to the entry.
    pub fn handle_config_entry_request(&self, ctx: &CancellationToken, request: ConfigEntryRequest) {
        self.spawn_ad_hoc(ctx, request.definition, Some(request.binder));
    }

    fn spawn_ad_hoc(&self, ctx: &CancellationToken, mut definition: Definition, binder: Option<Arc<dyn DiscoveryBinder>>) {
        definition.interval = Duration::ZERO;
        let hash = definition.command_channel_request.as_ref().map(|r| r.command_hash.clone());
        let run_ctx = ctx.child_token();

        let (pid_tx, pid_rx) = oneshot::channel::<u32>();
        let (exit_tx, exit_rx) = oneshot::channel::<i32>();

        let pid_cell = hash.as_ref().map(|h| self.tracker.register(h.clone(), run_ctx.clone()).0);

        let runner = Runner::new(definition, binder, Arc::clone(&self.emitter), Arc::clone(&self.flags));
        tokio::spawn(async move {
            runner.run_single(run_ctx, Some(pid_tx), Some(exit_tx)).await;
        });

        match pid_cell {
            Some(pid_cell) => {
                tokio::spawn(async move {
                    if let Ok(pid) = pid_rx.await {
                        *pid_cell.lock() = Some(pid);
                    }
                });
            }
            None => drop(pid_rx),
        }

        match hash {
            Some(hash) => {
                let tracker = Arc::clone(&self.tracker);
                tokio::spawn(async move {
                    if let Ok(code) = exit_rx.await {
                        tracker.record_exit(&hash, code);
                    }
                    tracker.unregister(&hash);
                });
            }
            None => drop(exit_rx),
        }
    }

    /// Cancel the run registered under `hash`, if any.
    pub fn handle_termination_request(&self, hash: &str) {
        self.tracker.cancel(hash);
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Dispatch loop: reads the three command-channel queues and the
    /// watcher events concurrently with cancellation (SPEC_FULL.md §4.5
    /// Lifecycle).
    pub async fn run(&self, ctx: CancellationToken, mut watcher: Box<dyn FsWatcher>, mut queues: ManagerQueues) {
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return,
                events = watcher.recv() => {
                    match events {
                        Some(events) => {
                            for event in events {
                                self.handle_fs_event(event, watcher.as_mut());
                            }
                        }
                        None => return,
                    }
                }
                Some(req) = queues.definitions.recv() => self.handle_definition_request(&ctx, req),
                Some(req) = queues.config_entries.recv() => self.handle_config_entry_request(&ctx, req),
                Some(hash) = queues.terminations.recv() => self.handle_termination_request(&hash),
            }
        }
    }
}
