// SPDX-License-Identifier: MIT

//! Error taxonomy for the engine crate (SPEC_FULL.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to materialise config template: {0}")]
    TempFile(#[source] std::io::Error),
    #[error("run cancelled")]
    Cancelled,
    #[error("run exceeded its timeout")]
    Timeout,
}
