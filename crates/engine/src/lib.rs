// SPDX-License-Identifier: MIT

//! Runner/Group layer around `isup-core`'s `Definition` and `isup-adapters`'s
//! `Executor`: discovery-driven fan-out, periodic scheduling, `when_conditions`
//! evaluation, and payload assembly (SPEC_FULL.md §4.3-§4.4).

pub mod binder;
pub mod emitter;
pub mod error;
pub mod group;
pub mod run;
pub mod runner;
pub mod severity;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod when;

pub use binder::{interpolate, references_config_path, DiscoveryBinder, DiscoveryMatch, StaticBinder, TemplateBinder};
pub use emitter::{NoopEmitter, PayloadEmitter};
#[cfg(any(test, feature = "test-support"))]
pub use emitter::{EmittedPayload, FakeEmitter};
pub use error::RunnerError;
pub use group::Group;
pub use run::{run, MatchedOutput, RunOptions};
pub use runner::Runner;
pub use severity::{classify, Severity};
pub use when::{evaluate as evaluate_when_conditions, AllFlagsEnabled, FeatureFlagSource};
