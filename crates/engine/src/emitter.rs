// SPDX-License-Identifier: MIT

//! The telemetry emitter is an explicit external collaborator (SPEC_FULL.md
//! §1 non-goals); this crate only defines the narrow interface the Runner
//! needs, plus a fake for tests.

use std::collections::HashMap;

/// Receives one complete payload per run, delimited by process end rather
/// than by newline (SPEC_FULL.md §4.3 Runner loop). `labels` already has any
/// discovery-match `extra_labels` merged in; `entity_rewrite` is the
/// opaque per-match directive forwarded unchanged (SPEC_FULL.md §4.3 step 2).
pub trait PayloadEmitter: Send + Sync {
    fn emit(&self, name: &str, labels: &HashMap<String, String>, entity_rewrite: Option<&str>, payload: Vec<u8>);
}

/// Emitter that drops every payload, logging at `debug`. Used where the repo
/// is wired up standalone, with the real emitter left to the host agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl PayloadEmitter for NoopEmitter {
    fn emit(&self, name: &str, labels: &HashMap<String, String>, entity_rewrite: Option<&str>, payload: Vec<u8>) {
        tracing::debug!(
            integration = name,
            labels = ?labels,
            entity_rewrite,
            bytes = payload.len(),
            "dropping payload: no emitter configured"
        );
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::PayloadEmitter;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EmittedPayload {
        pub name: String,
        pub labels: HashMap<String, String>,
        pub entity_rewrite: Option<String>,
        pub payload: Vec<u8>,
    }

    /// Records every emitted payload for assertions.
    #[derive(Clone, Default)]
    pub struct FakeEmitter {
        payloads: Arc<Mutex<Vec<EmittedPayload>>>,
    }

    impl FakeEmitter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn payloads(&self) -> Vec<EmittedPayload> {
            self.payloads.lock().clone()
        }
    }

    impl PayloadEmitter for FakeEmitter {
        fn emit(&self, name: &str, labels: &HashMap<String, String>, entity_rewrite: Option<&str>, payload: Vec<u8>) {
            self.payloads.lock().push(EmittedPayload {
                name: name.to_string(),
                labels: labels.clone(),
                entity_rewrite: entity_rewrite.map(str::to_string),
                payload,
            });
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{EmittedPayload, FakeEmitter};
