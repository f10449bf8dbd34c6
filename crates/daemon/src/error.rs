// SPDX-License-Identifier: MIT

//! Error taxonomy for the daemon crate (SPEC_FULL.md §7): Configuration and
//! Lifecycle errors are logged at `warn` with the file name and never
//! propagated out of the dispatch loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("failed to watch {path}: {source}")]
    Watch { path: String, #[source] source: notify::Error },
    #[error("failed to load {path}: {source}")]
    Load { path: String, #[source] source: LoadError },
    #[error("io error on {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Config(#[from] isup_core::ConfigError),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("log-forwarder is not available: {0}")]
    ForwarderUnavailable(String),
}
