// SPDX-License-Identifier: MIT

//! OS-facing adapters for the integration supervisor: process execution,
//! child environment construction, and temp-file lifecycle management
//! (SPEC_FULL.md §4.1, §6).

pub mod env;
pub mod executor;
pub mod output;
pub mod temp_file;

pub use env::{build_child_env, glob_match, EnvSource, OsEnvSource};
#[cfg(any(test, feature = "test-support"))]
pub use env::FakeEnvSource;
pub use executor::{execute, execute_with_env, ExecError, ExecuteOptions, NON_EXIT_CODE};
pub use output::OutputReceive;
pub use temp_file::{purge_oldest_beyond_cap, OsTempFileFactory};
