// SPDX-License-Identifier: MIT

//! Filesystem-driven Manager and long-lived Supervisor sidecar around
//! `isup-engine`'s `Group`/`Runner` (SPEC_FULL.md §4.5-§4.6).

pub mod config;
pub mod error;
pub mod manager;
pub mod supervisor;
pub mod tracker;
pub mod watcher;
pub mod yaml;

pub use config::{LogForwarderConfig, SupervisorConfig};
pub use error::{LoadError, ManagerError, SupervisorError};
pub use manager::{channel_pair, ConfigEntryRequest, DefinitionRequest, Manager, ManagerHandles, ManagerQueues};
pub use supervisor::{backoff_for, Supervisor, SupervisorEvent};
pub use tracker::Tracker;
pub use watcher::{FsEvent, FsEventKind, FsWatcher, RealFsWatcher};
#[cfg(any(test, feature = "test-support"))]
pub use watcher::FakeFsWatcher;
pub use yaml::{looks_like_integration_yaml, parse_definition};
