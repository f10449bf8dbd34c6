// SPDX-License-Identifier: MIT

//! Bundle of Runners sharing a config file and discovery source
//! (SPEC_FULL.md §4.4, unchanged from `spec.md`).

use crate::binder::DiscoveryBinder;
use crate::emitter::PayloadEmitter;
use crate::runner::Runner;
use crate::when::FeatureFlagSource;
use isup_core::Definition;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct GroupState {
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

/// Holds an ordered list of [`Definition`]s, an optional discovery source,
/// and a cancellation handle behind its own lock (SPEC_FULL.md §4.4).
pub struct Group {
    definitions: Vec<Definition>,
    binder: Option<Arc<dyn DiscoveryBinder>>,
    emitter: Arc<dyn PayloadEmitter>,
    flags: Arc<dyn FeatureFlagSource>,
    state: Mutex<GroupState>,
}

impl Group {
    pub fn new(
        definitions: Vec<Definition>,
        binder: Option<Arc<dyn DiscoveryBinder>>,
        emitter: Arc<dyn PayloadEmitter>,
        flags: Arc<dyn FeatureFlagSource>,
    ) -> Self {
        Self { definitions, binder, emitter, flags, state: Mutex::new(GroupState { cancel: None, handles: Vec::new() }) }
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Launch one Runner task per Definition and store the cancel handle.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.cancel.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(self.definitions.len());
        for def in &self.definitions {
            let runner = Runner::new(def.clone(), self.binder.clone(), Arc::clone(&self.emitter), Arc::clone(&self.flags));
            let ctx = cancel.child_token();
            handles.push(tokio::spawn(async move { runner.run_loop(ctx).await }));
        }
        state.cancel = Some(cancel);
        state.handles = handles;
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.handles.clear();
    }

    /// Force `interval=0` on clones of every Definition and wait for all of
    /// them to complete one run each.
    pub async fn run_once(&self) {
        let ctx = CancellationToken::new();
        let mut handles = Vec::with_capacity(self.definitions.len());
        for def in &self.definitions {
            let mut def = def.clone();
            def.interval = std::time::Duration::ZERO;
            let runner = Runner::new(def, self.binder.clone(), Arc::clone(&self.emitter), Arc::clone(&self.flags));
            let ctx = ctx.child_token();
            handles.push(tokio::spawn(async move { runner.run_loop(ctx).await }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().cancel.is_some()
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
