// SPDX-License-Identifier: MIT

//! Maps command-hashes to the running task they were requested for
//! (SPEC_FULL.md §4.5 Command-channel requests), so a termination request
//! can cancel the right run and record its exit code.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Tracked {
    cancel: CancellationToken,
    pid: Arc<Mutex<Option<u32>>>,
    exit_code: Arc<Mutex<Option<i32>>>,
}

/// Registry of in-flight ad-hoc runs, keyed by command-hash.
#[derive(Default)]
pub struct Tracker {
    inner: Mutex<HashMap<String, Tracked>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly started run, returning the pid sink / exit-code sink
    /// to hand to the executor.
    pub fn register(
        &self,
        hash: String,
        cancel: CancellationToken,
    ) -> (Arc<Mutex<Option<u32>>>, Arc<Mutex<Option<i32>>>) {
        let pid = Arc::new(Mutex::new(None));
        let exit_code = Arc::new(Mutex::new(None));
        self.inner.lock().insert(
            hash,
            Tracked { cancel, pid: Arc::clone(&pid), exit_code: Arc::clone(&exit_code) },
        );
        (pid, exit_code)
    }

    pub fn record_exit(&self, hash: &str, code: i32) {
        if let Some(t) = self.inner.lock().get(hash) {
            *t.exit_code.lock() = Some(code);
        }
    }

    pub fn unregister(&self, hash: &str) {
        self.inner.lock().remove(hash);
    }

    /// Cancel the run registered under `hash`. `false` if no such run exists.
    pub fn cancel(&self, hash: &str) -> bool {
        match self.inner.lock().get(hash) {
            Some(t) => {
                t.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn pid_of(&self, hash: &str) -> Option<u32> {
        self.inner.lock().get(hash).and_then(|t| *t.pid.lock())
    }

    pub fn exit_code_of(&self, hash: &str) -> Option<i32> {
        self.inner.lock().get(hash).and_then(|t| *t.exit_code.lock())
    }

    pub fn is_tracked(&self, hash: &str) -> bool {
        self.inner.lock().contains_key(hash)
    }
}
