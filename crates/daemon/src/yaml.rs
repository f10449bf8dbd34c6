// SPDX-License-Identifier: MIT

//! Integration YAML loader (SPEC_FULL.md §6): one file → one [`Definition`].
//!
//! Deserialized with `serde_yaml` the way the rest of the pack reaches for
//! `serde`-ecosystem crates for structured config. Unknown fields are
//! ignored with a `debug!` log rather than rejected, matching the teacher's
//! tolerance for schema evolution in wire/protocol types.

use crate::error::LoadError;
use isup_core::{
    resolve_interval, resolve_timeout, CommandChannelRequest, Definition, DurationLimits,
    ExecutorConfig, InventorySource, Runnable, TempFileFactory, WhenCondition,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawWhen {
    file_exists: Option<String>,
    env_exists: Option<HashMap<String, String>>,
    feature: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum RawExec {
    #[default]
    None,
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum RawConfig {
    #[default]
    None,
    Inline(String),
    Mapping(HashMap<String, String>),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct IntegrationFile {
    name: String,
    exec: RawExec,
    integration_name: Option<String>,
    command: Option<String>,
    arguments: HashMap<String, String>,
    env: HashMap<String, String>,
    labels: HashMap<String, String>,
    interval: Option<String>,
    timeout: Option<String>,
    inventory_source: Option<String>,
    user: Option<String>,
    work_dir: Option<String>,
    config: RawConfig,
    config_template_path: Option<String>,
    #[serde(rename = "when")]
    when: Option<RawWhen>,
}

/// Parse one integration YAML document into a [`Definition`], using
/// `limits` to resolve `interval`/`timeout` and `temp_file_factory` for the
/// Definition's injectable temp-file creator.
pub fn parse_definition(
    yaml: &str,
    limits: &DurationLimits,
    temp_file_factory: Arc<dyn TempFileFactory>,
) -> Result<Definition, LoadError> {
    let raw: IntegrationFile = serde_yaml::from_str(yaml)?;

    if raw.name.trim().is_empty() {
        return Err(LoadError::Config(isup_core::ConfigError::EmptyName));
    }

    let (path, args) = resolve_executable(&raw)?;

    let mut executor_config = ExecutorConfig {
        environment: raw.env.clone(),
        working_directory: raw.work_dir.clone().unwrap_or_default().into(),
        ..ExecutorConfig::default()
    };
    executor_config.user = raw.user.clone();

    let mut args = args;
    for (flag, value) in &raw.arguments {
        args.push(format!("--{flag}"));
        args.push(value.clone());
    }

    let inventory_source = match raw.inventory_source.as_deref() {
        None | Some("") => None,
        Some(s) => Some(InventorySource::parse(s)?),
    };

    let when_conditions = raw.when.map(to_when_conditions).unwrap_or_default();

    let config_template = config_template_bytes(&raw)?;

    Ok(Definition {
        name: raw.name,
        labels: raw.labels,
        executor_config: executor_config.clone(),
        interval: resolve_interval(raw.interval.as_deref(), limits),
        timeout: resolve_timeout(raw.timeout.as_deref(), limits),
        config_template,
        inventory_source,
        when_conditions,
        command_channel_request: None::<CommandChannelRequest>,
        runnable: Runnable::new(path, args, executor_config),
        temp_file_factory,
    })
}

fn resolve_executable(raw: &IntegrationFile) -> Result<(PathBuf, Vec<String>), LoadError> {
    match &raw.exec {
        RawExec::Single(s) => return Ok((PathBuf::from(s), Vec::new())),
        RawExec::Many(parts) => {
            let mut iter = parts.iter();
            let Some(path) = iter.next() else {
                return Err(LoadError::Config(isup_core::ConfigError::NoExecutable));
            };
            return Ok((PathBuf::from(path), iter.cloned().collect()));
        }
        RawExec::None => {}
    }

    // Legacy `integration_name` + `command` selection: the repository that
    // resolves named integration definitions is an external collaborator
    // out of scope here, so the name is used directly as the executable and
    // `command` as its first argument.
    if let Some(integration_name) = &raw.integration_name {
        let mut args = Vec::new();
        if let Some(command) = &raw.command {
            args.push(command.clone());
        }
        return Ok((PathBuf::from(integration_name), args));
    }

    Err(LoadError::Config(isup_core::ConfigError::NoExecutable))
}

fn to_when_conditions(raw: RawWhen) -> Vec<WhenCondition> {
    let mut conditions = Vec::new();
    if let Some(path) = raw.file_exists {
        conditions.push(WhenCondition::FileExists(PathBuf::from(path)));
    }
    if let Some(env) = raw.env_exists {
        conditions.push(WhenCondition::EnvExists(env));
    }
    if let Some(feature) = raw.feature {
        conditions.push(WhenCondition::FeatureFlag(feature));
    }
    conditions
}

fn config_template_bytes(raw: &IntegrationFile) -> Result<Option<Vec<u8>>, LoadError> {
    if let Some(path) = &raw.config_template_path {
        return Ok(Some(std::fs::read(path)?));
    }
    match &raw.config {
        RawConfig::None => Ok(None),
        RawConfig::Inline(s) => Ok(Some(s.clone().into_bytes())),
        RawConfig::Mapping(map) => Ok(Some(serde_yaml::to_string(map)?.into_bytes())),
    }
}

/// Validate that `path` parses as a well-formed integration YAML document
/// without fully resolving it (used by the Manager to decide whether a
/// filesystem event names a file worth loading at all).
pub fn looks_like_integration_yaml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "yaml" || ext == "yml").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isup_core::FakeTempFileFactory;

    fn factory() -> Arc<dyn TempFileFactory> {
        Arc::new(FakeTempFileFactory::new())
    }

    #[test]
    fn parses_minimal_exec_string() {
        let yaml = "name: ping\nexec: /usr/bin/ping\n";
        let def = parse_definition(yaml, &DurationLimits::default(), factory()).unwrap();
        assert_eq!(def.name, "ping");
        assert_eq!(def.runnable.path, PathBuf::from("/usr/bin/ping"));
        assert!(def.runnable.args.is_empty());
    }

    #[test]
    fn parses_exec_list_with_args() {
        let yaml = "name: ping\nexec: [\"/usr/bin/ping\", \"-c\", \"1\"]\n";
        let def = parse_definition(yaml, &DurationLimits::default(), factory()).unwrap();
        assert_eq!(def.runnable.path, PathBuf::from("/usr/bin/ping"));
        assert_eq!(def.runnable.args, vec!["-c".to_string(), "1".to_string()]);
    }

    #[test]
    fn rejects_empty_name() {
        let yaml = "name: \"\"\nexec: /bin/true\n";
        assert!(parse_definition(yaml, &DurationLimits::default(), factory()).is_err());
    }

    #[test]
    fn rejects_missing_executable() {
        let yaml = "name: nothing\n";
        assert!(parse_definition(yaml, &DurationLimits::default(), factory()).is_err());
    }

    #[test]
    fn rejects_malformed_inventory_source() {
        let yaml = "name: x\nexec: /bin/true\ninventory_source: no-slash\n";
        assert!(parse_definition(yaml, &DurationLimits::default(), factory()).is_err());
    }

    #[test]
    fn parses_when_conditions() {
        let yaml = "name: x\nexec: /bin/true\nwhen:\n  file_exists: /tmp/flag\n  feature: beta\n";
        let def = parse_definition(yaml, &DurationLimits::default(), factory()).unwrap();
        assert_eq!(def.when_conditions.len(), 2);
    }

    #[test]
    fn parses_inline_config_template() {
        let yaml = "name: x\nexec: /bin/true\nconfig: \"key: value\"\n";
        let def = parse_definition(yaml, &DurationLimits::default(), factory()).unwrap();
        assert_eq!(def.config_template, Some(b"key: value".to_vec()));
    }

    #[test]
    fn legacy_integration_name_falls_back_to_direct_argv() {
        let yaml = "name: legacy\nintegration_name: switchlib\ncommand: poll\n";
        let def = parse_definition(yaml, &DurationLimits::default(), factory()).unwrap();
        assert_eq!(def.runnable.path, PathBuf::from("switchlib"));
        assert_eq!(def.runnable.args, vec!["poll".to_string()]);
    }
}
