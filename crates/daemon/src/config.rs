// SPDX-License-Identifier: MIT

//! Ambient daemon configuration (SPEC_FULL.md §6): watched directories,
//! default/floor durations, the temp-file purge cap, and the log-forwarder
//! sidecar's binary/plugin/parsers paths. `toml`-deserialized the way the
//! rest of the ambient stack reaches for `serde`-ecosystem crates.

use isup_core::DurationLimits;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn parse_duration_field(raw: &str, field: &'static str) -> Result<Duration, String> {
    isup_core::parse_duration(raw).map_err(|e| format!("{field}: {e}"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawLimits {
    default_interval: String,
    interval_floor: String,
    default_timeout: String,
    timeout_floor: String,
}

impl Default for RawLimits {
    fn default() -> Self {
        let d = DurationLimits::default();
        Self {
            default_interval: format!("{}s", d.default_interval.as_secs()),
            interval_floor: format!("{}s", d.interval_floor.as_secs()),
            default_timeout: format!("{}s", d.default_timeout.as_secs()),
            timeout_floor: format!("{}s", d.timeout_floor.as_secs()),
        }
    }
}

impl RawLimits {
    fn resolve(&self) -> Result<DurationLimits, String> {
        Ok(DurationLimits {
            default_interval: parse_duration_field(&self.default_interval, "default_interval")?,
            interval_floor: parse_duration_field(&self.interval_floor, "interval_floor")?,
            default_timeout: parse_duration_field(&self.default_timeout, "default_timeout")?,
            timeout_floor: parse_duration_field(&self.timeout_floor, "timeout_floor")?,
        })
    }
}

/// Paths to the log-forwarder sidecar's binary, plugin library, and parsers
/// file (SPEC_FULL.md §6). The sidecar is disabled unless all three exist.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogForwarderConfig {
    pub binary: PathBuf,
    pub plugin: PathBuf,
    pub parsers: PathBuf,
}

impl LogForwarderConfig {
    pub fn is_available(&self) -> bool {
        self.binary.is_file() && self.plugin.is_file() && self.parsers.is_file()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawSupervisorConfig {
    watch_dirs: Vec<PathBuf>,
    limits: RawLimits,
    temp_file_purge_cap: usize,
    log_forwarder: LogForwarderConfig,
}

impl Default for RawSupervisorConfig {
    fn default() -> Self {
        Self {
            watch_dirs: Vec::new(),
            limits: RawLimits::default(),
            temp_file_purge_cap: 256,
            log_forwarder: LogForwarderConfig::default(),
        }
    }
}

/// Top-level daemon configuration (ambient, not named in `spec.md`).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub watch_dirs: Vec<PathBuf>,
    pub limits: DurationLimits,
    pub temp_file_purge_cap: usize,
    pub log_forwarder: LogForwarderConfig,
}

impl SupervisorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, String> {
        let raw: RawSupervisorConfig = toml::from_str(s).map_err(|e| e.to_string())?;
        Ok(Self {
            watch_dirs: raw.watch_dirs,
            limits: raw.limits.resolve()?,
            temp_file_purge_cap: raw.temp_file_purge_cap,
            log_forwarder: raw.log_forwarder,
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, String> {
        let s = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::from_toml_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_duration_limits_default() {
        let cfg = SupervisorConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.limits.default_interval, DurationLimits::default().default_interval);
        assert_eq!(cfg.temp_file_purge_cap, 256);
        assert!(cfg.watch_dirs.is_empty());
    }

    #[test]
    fn parses_watch_dirs_and_limits() {
        let toml_str = r#"
            watch_dirs = ["/etc/isup/integrations", "/opt/isup/integrations"]
            temp_file_purge_cap = 64

            [limits]
            default_interval = "30s"
            interval_floor = "5s"
            default_timeout = "10s"
            timeout_floor = "2s"
        "#;
        let cfg = SupervisorConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(cfg.watch_dirs.len(), 2);
        assert_eq!(cfg.limits.default_interval, Duration::from_secs(30));
        assert_eq!(cfg.temp_file_purge_cap, 64);
    }

    #[test]
    fn log_forwarder_unavailable_when_paths_missing() {
        let cfg = LogForwarderConfig {
            binary: PathBuf::from("/does/not/exist"),
            plugin: PathBuf::from("/does/not/exist"),
            parsers: PathBuf::from("/does/not/exist"),
        };
        assert!(!cfg.is_available());
    }

    #[test]
    fn rejects_invalid_duration_in_limits() {
        let toml_str = r#"
            [limits]
            default_interval = "not-a-duration"
        "#;
        assert!(SupervisorConfig::from_toml_str(toml_str).is_err());
    }
}
