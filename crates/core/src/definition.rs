// SPDX-License-Identifier: MIT

//! Data model of one integration instance (SPEC_FULL.md §3).

use crate::error::{parse_duration, ConfigError};
use crate::hash::{DefinitionHash, Hasher};
use crate::temp_file::TempFileFactory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default and floor durations applied when resolving `interval`/`timeout`.
#[derive(Debug, Clone, Copy)]
pub struct DurationLimits {
    pub default_interval: Duration,
    pub interval_floor: Duration,
    pub default_timeout: Duration,
    pub timeout_floor: Duration,
}

impl Default for DurationLimits {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(60),
            interval_floor: Duration::from_secs(10),
            default_timeout: Duration::from_secs(30),
            timeout_floor: Duration::from_secs(5),
        }
    }
}

/// Resolve the `interval` field per SPEC_FULL.md §3/§4.3.
///
/// `None` (unset) and `Some("")` use the default. An invalid string falls
/// back to the default with a warning. Zero means single-shot, unclamped.
/// Any other value below the floor is clamped up to the floor, with a
/// warning.
pub fn resolve_interval(raw: Option<&str>, limits: &DurationLimits) -> Duration {
    let raw = raw.filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return limits.default_interval;
    };
    match parse_duration(raw) {
        Ok(d) if d.is_zero() => Duration::ZERO,
        Ok(d) if d < limits.interval_floor => {
            tracing::warn!(value = raw, floor_secs = limits.interval_floor.as_secs(), "interval below floor, clamping");
            limits.interval_floor
        }
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(value = raw, error = %e, "invalid interval, using default");
            limits.default_interval
        }
    }
}

/// Resolve the `timeout` field per SPEC_FULL.md §3/§4.3.
///
/// `None` uses the default. Zero (or negative, which can't occur with a
/// `Duration`) disables the timeout. Anything below the floor is clamped up.
pub fn resolve_timeout(raw: Option<&str>, limits: &DurationLimits) -> Option<Duration> {
    let raw = raw.filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Some(limits.default_timeout);
    };
    match parse_duration(raw) {
        Ok(d) if d.is_zero() => None,
        Ok(d) if d < limits.timeout_floor => {
            tracing::warn!(value = raw, floor_secs = limits.timeout_floor.as_secs(), "timeout below floor, clamping");
            Some(limits.timeout_floor)
        }
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(value = raw, error = %e, "invalid timeout, using default");
            Some(limits.default_timeout)
        }
    }
}

/// Per-process environment and identity configuration (SPEC_FULL.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// POSIX user to run as; ignored on Windows (SPEC_FULL.md §4.1).
    pub user: Option<String>,
    pub working_directory: PathBuf,
    pub environment: HashMap<String, String>,
    /// Variable names to copy from the OS environment; entries may end in
    /// `*` to match any OS variable name with that prefix (SPEC_FULL.md §3).
    pub passthrough_env: Vec<String>,
}

impl ExecutorConfig {
    crate::setters! {
        option { user: String }
        into { working_directory: PathBuf }
        set { environment: HashMap<String, String> }
        set { passthrough_env: Vec<String> }
    }
}

/// A two-part inventory identifier (`category/term`); empty string is the
/// sentinel for "no inventory source" and is represented as `None` by callers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InventorySource {
    pub category: String,
    pub term: String,
}

impl InventorySource {
    /// Parse `"category/term"`. An empty string is rejected here; callers
    /// should treat an empty raw field as `None` before calling this.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.split_once('/') {
            Some((category, term)) if !category.is_empty() && !term.is_empty() => {
                Ok(Self { category: category.to_string(), term: term.to_string() })
            }
            _ => Err(ConfigError::InvalidInventorySource(raw.to_string())),
        }
    }
}

impl std::fmt::Display for InventorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.term)
    }
}

/// A precondition evaluated before each run (SPEC_FULL.md §3/§4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhenCondition {
    FileExists(PathBuf),
    EnvExists(HashMap<String, String>),
    FeatureFlag(String),
}

/// Identifies the command-channel caller that requested an ad-hoc run, for
/// traceability and Tracker lookups (SPEC_FULL.md §3/§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandChannelRequest {
    pub caller: String,
    pub command_hash: String,
}

/// Opaque compiled command: what actually gets executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runnable {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub executor_config: ExecutorConfig,
}

impl Runnable {
    pub fn new(path: impl Into<PathBuf>, args: Vec<String>, executor_config: ExecutorConfig) -> Self {
        Self { path: path.into(), args, executor_config }
    }
}

/// A value describing how and when to run an integration (SPEC_FULL.md §3).
#[derive(Clone)]
pub struct Definition {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub executor_config: ExecutorConfig,
    /// Zero means single-shot.
    pub interval: Duration,
    /// `None` means the timeout is disabled.
    pub timeout: Option<Duration>,
    pub config_template: Option<Vec<u8>>,
    pub inventory_source: Option<InventorySource>,
    pub when_conditions: Vec<WhenCondition>,
    pub command_channel_request: Option<CommandChannelRequest>,
    pub runnable: Runnable,
    pub temp_file_factory: Arc<dyn TempFileFactory>,
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .field("executor_config", &self.executor_config)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("inventory_source", &self.inventory_source)
            .field("when_conditions", &self.when_conditions)
            .field("runnable", &self.runnable)
            .field("hash", &self.hash())
            .finish_non_exhaustive()
    }
}

impl Definition {
    /// Stable fingerprint over the semantic fields named in SPEC_FULL.md §3:
    /// not `command_channel_request` (caller provenance, not identity) and
    /// not `runnable`/`temp_file_factory` (derived/injectable).
    pub fn hash(&self) -> DefinitionHash {
        let mut h = Hasher::new();
        h.update_field("name", &self.name);

        let mut labels: Vec<_> = self.labels.iter().collect();
        labels.sort_by_key(|(k, _)| k.as_str());
        for (k, v) in labels {
            h.update_field("label", &format!("{k}={v}"));
        }

        h.update_field("user", self.executor_config.user.as_deref().unwrap_or(""));
        h.update_field(
            "working_directory",
            &self.executor_config.working_directory.display().to_string(),
        );
        let mut env: Vec<_> = self.executor_config.environment.iter().collect();
        env.sort_by_key(|(k, _)| k.as_str());
        for (k, v) in env {
            h.update_field("env", &format!("{k}={v}"));
        }
        for p in &self.executor_config.passthrough_env {
            h.update_field("passthrough", p);
        }

        h.update_field("interval_ms", &self.interval.as_millis().to_string());
        h.update_field(
            "timeout_ms",
            &self.timeout.map(|d| d.as_millis().to_string()).unwrap_or_default(),
        );
        h.update_field("config_template", &self.config_template.as_deref().unwrap_or(&[]).len().to_string());
        if let Some(bytes) = &self.config_template {
            h.update(bytes);
        }
        h.update_field(
            "inventory_source",
            &self.inventory_source.as_ref().map(|s| s.to_string()).unwrap_or_default(),
        );
        for cond in &self.when_conditions {
            match cond {
                WhenCondition::FileExists(p) => h.update_field("when_file", &p.display().to_string()),
                WhenCondition::EnvExists(m) => {
                    let mut entries: Vec<_> = m.iter().collect();
                    entries.sort_by_key(|(k, _)| k.as_str());
                    for (k, v) in entries {
                        h.update_field("when_env", &format!("{k}={v}"));
                    }
                    &mut h
                }
                WhenCondition::FeatureFlag(name) => h.update_field("when_feature", name),
            };
        }
        h.update_field("path", &self.runnable.path.display().to_string());
        for (i, arg) in self.runnable.args.iter().enumerate() {
            h.update_field(&format!("arg{i}"), arg);
        }

        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp_file::FakeTempFileFactory;

    fn def(name: &str) -> Definition {
        Definition {
            name: name.to_string(),
            labels: HashMap::new(),
            executor_config: ExecutorConfig::default(),
            interval: Duration::from_secs(60),
            timeout: Some(Duration::from_secs(30)),
            config_template: None,
            inventory_source: None,
            when_conditions: vec![],
            command_channel_request: None,
            runnable: Runnable::new("/bin/true", vec![], ExecutorConfig::default()),
            temp_file_factory: Arc::new(FakeTempFileFactory::new()),
        }
    }

    #[test]
    fn equal_definitions_hash_equal() {
        assert_eq!(def("foo").hash(), def("foo").hash());
    }

    #[test]
    fn different_names_hash_differently() {
        assert_ne!(def("foo").hash(), def("bar").hash());
    }

    #[test]
    fn command_channel_request_does_not_affect_hash() {
        let mut a = def("foo");
        let mut b = def("foo");
        a.command_channel_request =
            Some(CommandChannelRequest { caller: "x".into(), command_hash: "1".into() });
        b.command_channel_request =
            Some(CommandChannelRequest { caller: "y".into(), command_hash: "2".into() });
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn resolve_interval_defaults_when_unset() {
        let limits = DurationLimits::default();
        assert_eq!(resolve_interval(None, &limits), limits.default_interval);
        assert_eq!(resolve_interval(Some(""), &limits), limits.default_interval);
    }

    #[test]
    fn resolve_interval_zero_is_single_shot() {
        let limits = DurationLimits::default();
        assert_eq!(resolve_interval(Some("0s"), &limits), Duration::ZERO);
    }

    #[test]
    fn resolve_interval_clamps_to_floor() {
        let limits = DurationLimits::default();
        assert_eq!(resolve_interval(Some("1s"), &limits), limits.interval_floor);
    }

    #[test]
    fn resolve_interval_invalid_falls_back_to_default() {
        let limits = DurationLimits::default();
        assert_eq!(resolve_interval(Some("not-a-duration"), &limits), limits.default_interval);
    }

    #[test]
    fn resolve_timeout_disabled_at_zero() {
        let limits = DurationLimits::default();
        assert_eq!(resolve_timeout(Some("0"), &limits), None);
    }

    #[test]
    fn resolve_timeout_defaults_when_unset() {
        let limits = DurationLimits::default();
        assert_eq!(resolve_timeout(None, &limits), Some(limits.default_timeout));
    }

    #[test]
    fn inventory_source_parses_category_slash_term() {
        let s = InventorySource::parse("network/switch").unwrap();
        assert_eq!(s.category, "network");
        assert_eq!(s.term, "switch");
    }

    #[test]
    fn inventory_source_rejects_malformed() {
        assert!(InventorySource::parse("no-slash").is_err());
        assert!(InventorySource::parse("/term").is_err());
        assert!(InventorySource::parse("category/").is_err());
    }
}
