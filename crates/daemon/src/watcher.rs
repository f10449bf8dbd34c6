// SPDX-License-Identifier: MIT

//! Filesystem watching behind an injectable trait (SPEC_FULL.md §4.5), so
//! the Manager's dispatch loop can be driven by synthetic events in tests
//! without touching a real filesystem, mirroring the teacher's
//! adapter-trait-plus-fake pattern.

use async_trait::async_trait;
use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Write,
    Remove,
    Rename,
    Other,
}

#[derive(Debug, Clone)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl From<NotifyEvent> for Vec<FsEvent> {
    fn from(event: NotifyEvent) -> Self {
        let kind = match event.kind {
            EventKind::Create(_) => FsEventKind::Create,
            EventKind::Modify(notify::event::ModifyKind::Name(_)) => FsEventKind::Rename,
            EventKind::Modify(_) => FsEventKind::Write,
            EventKind::Remove(_) => FsEventKind::Remove,
            _ => FsEventKind::Other,
        };
        event.paths.into_iter().map(|path| FsEvent { kind, path }).collect()
    }
}

/// Watches paths for changes and forwards [`FsEvent`]s, abstracted so the
/// Manager can be driven by a fake in tests.
#[async_trait]
pub trait FsWatcher: Send {
    fn watch(&mut self, path: &Path) -> notify::Result<()>;
    fn unwatch(&mut self, path: &Path) -> notify::Result<()>;
    /// Receive the next batch of events, or `None` once the watcher is
    /// dropped.
    async fn recv(&mut self) -> Option<Vec<FsEvent>>;
}

/// `notify::recommended_watcher` wrapped to forward events over an
/// `mpsc` channel, the same idiom the teacher's `tail_file` uses.
pub struct RealFsWatcher {
    watcher: notify::RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<Vec<FsEvent>>,
}

impl RealFsWatcher {
    pub fn new() -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            match res {
                Ok(event) => {
                    let events: Vec<FsEvent> = event.into();
                    if !events.is_empty() {
                        let _ = tx.send(events);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "filesystem watch error"),
            }
        })?;
        Ok(Self { watcher, rx })
    }
}

#[async_trait]
impl FsWatcher for RealFsWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)
    }

    fn unwatch(&mut self, path: &Path) -> notify::Result<()> {
        self.watcher.unwatch(path)
    }

    async fn recv(&mut self) -> Option<Vec<FsEvent>> {
        self.rx.recv().await
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use std::collections::HashSet;

    /// Test double: events are pushed in by the test via the paired sender,
    /// `watch`/`unwatch` just record which paths are currently watched.
    pub struct FakeFsWatcher {
        watched: HashSet<PathBuf>,
        rx: mpsc::UnboundedReceiver<Vec<FsEvent>>,
    }

    impl FakeFsWatcher {
        pub fn new() -> (Self, mpsc::UnboundedSender<Vec<FsEvent>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { watched: HashSet::new(), rx }, tx)
        }

        pub fn is_watched(&self, path: &Path) -> bool {
            self.watched.contains(path)
        }
    }

    #[async_trait]
    impl FsWatcher for FakeFsWatcher {
        fn watch(&mut self, path: &Path) -> notify::Result<()> {
            self.watched.insert(path.to_path_buf());
            Ok(())
        }

        fn unwatch(&mut self, path: &Path) -> notify::Result<()> {
            self.watched.remove(path);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Vec<FsEvent>> {
            self.rx.recv().await
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeFsWatcher;
