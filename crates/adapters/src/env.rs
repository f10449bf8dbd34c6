// SPDX-License-Identifier: MIT

//! Child environment construction: base env + explicit env + passthrough
//! (SPEC_FULL.md §4.1, §9 passthrough-wildcard resolution).

use isup_core::ExecutorConfig;
use std::collections::HashMap;

/// Source of OS environment variables, injectable so tests never depend on
/// the real process environment (Design Note, SPEC_FULL.md §9).
pub trait EnvSource: Send + Sync {
    fn vars(&self) -> Vec<(String, String)>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEnvSource;

impl EnvSource for OsEnvSource {
    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }
}

/// Build the full environment map for a child process.
///
/// Layering, per SPEC_FULL.md §4.1: current process environment, then
/// `executor_config.environment`, then OS values for each `passthrough_env`
/// entry (passthrough wins over `environment`), then `VERBOSE=1` if `verbose`.
pub fn build_child_env(
    os_env: &dyn EnvSource,
    config: &ExecutorConfig,
    verbose: bool,
) -> HashMap<String, String> {
    let base = os_env.vars();
    let mut env: HashMap<String, String> = base.iter().cloned().collect();

    for (k, v) in &config.environment {
        env.insert(k.clone(), v.clone());
    }

    for pattern in &config.passthrough_env {
        for (k, v) in &base {
            if glob_match(pattern, k) {
                env.insert(k.clone(), v.clone());
            }
        }
    }

    if verbose {
        env.insert("VERBOSE".to_string(), "1".to_string());
    }

    env
}

/// Match `candidate` against `pattern`, where `*` in `pattern` matches any
/// run of characters (including none). Deliberately narrower than a full
/// regex engine — the only wildcard need is OS variable-name prefixes like
/// `AWS_*` (SPEC_FULL.md §9 Open Question resolution).
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == candidate;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0usize;

    if let Some(first) = parts.first() {
        if !candidate[pos..].starts_with(first) {
            return false;
        }
        pos += first.len();
    }

    for part in &parts[1..parts.len().saturating_sub(1)] {
        if part.is_empty() {
            continue;
        }
        match candidate[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }

    if parts.len() > 1 {
        if let Some(last) = parts.last() {
            if !candidate[pos..].ends_with(last) {
                return false;
            }
        }
    }

    true
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::EnvSource;

    /// Fixed set of "OS" variables for tests.
    #[derive(Debug, Clone, Default)]
    pub struct FakeEnvSource(pub Vec<(String, String)>);

    impl FakeEnvSource {
        pub fn new(vars: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
            Self(vars.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        }
    }

    impl EnvSource for FakeEnvSource {
        fn vars(&self) -> Vec<(String, String)> {
            self.0.clone()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEnvSource;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_prefix_wildcard() {
        assert!(glob_match("AWS_*", "AWS_REGION"));
        assert!(!glob_match("AWS_*", "GCP_REGION"));
    }

    #[test]
    fn glob_match_exact_without_wildcard() {
        assert!(glob_match("HOME", "HOME"));
        assert!(!glob_match("HOME", "HOMER"));
    }

    #[test]
    fn glob_match_middle_wildcard() {
        assert!(glob_match("A*Z", "AxyzZ"));
        assert!(!glob_match("A*Z", "Axyz"));
    }

    // Scenario E5 (SPEC_FULL.md §8): passthrough overrides `environment`,
    // and passthrough-only vars are pulled in even if unset in `environment`.
    #[test]
    fn passthrough_overrides_explicit_environment() {
        let os = FakeEnvSource::new([("SOME_VAR", "system"), ("ANOTHER_VAR", "other")]);
        let mut config = ExecutorConfig::default();
        config.environment.insert("PREFIX".to_string(), "hello".to_string());
        config.environment.insert("SOME_VAR".to_string(), "integration".to_string());
        config.passthrough_env = vec!["SOME_VAR".to_string(), "ANOTHER_VAR".to_string()];

        let env = build_child_env(&os, &config, false);
        assert_eq!(env.get("PREFIX").map(String::as_str), Some("hello"));
        assert_eq!(env.get("SOME_VAR").map(String::as_str), Some("system"));
        assert_eq!(env.get("ANOTHER_VAR").map(String::as_str), Some("other"));
    }

    #[test]
    fn verbose_adds_one_variable() {
        let os = FakeEnvSource::new([]);
        let config = ExecutorConfig::default();
        let env = build_child_env(&os, &config, true);
        assert_eq!(env.get("VERBOSE").map(String::as_str), Some("1"));
    }
}
