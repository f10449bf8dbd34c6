// SPDX-License-Identifier: MIT

//! Data model for the integration supervisor core: [`Definition`] and its
//! constituent value types, the [`DefinitionHash`] fingerprint, a testable
//! [`Clock`] abstraction, and the injectable [`TempFileFactory`] trait.
//!
//! See `SPEC_FULL.md` §3 for the authoritative data model description.

pub mod clock;
pub mod definition;
pub mod error;
pub mod hash;
#[macro_use]
mod macros;
pub mod temp_file;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use definition::{
    resolve_interval, resolve_timeout, CommandChannelRequest, Definition, DurationLimits,
    ExecutorConfig, InventorySource, Runnable, WhenCondition,
};
pub use error::{parse_duration, ConfigError};
pub use hash::{DefinitionHash, Hasher};
pub use temp_file::{TempFile, TempFileFactory};
#[cfg(any(test, feature = "test-support"))]
pub use temp_file::FakeTempFileFactory;
