// SPDX-License-Identifier: MIT

//! Evaluates `when_conditions` before each run (SPEC_FULL.md §4.3 Runner loop).

use isup_core::WhenCondition;

/// Resolves `FeatureFlag` conditions; the command-channel client that owns
/// real flag state is an explicit external collaborator (SPEC_FULL.md §1).
pub trait FeatureFlagSource: Send + Sync {
    fn is_enabled(&self, name: &str) -> bool;
}

/// Treats every feature flag as enabled, for definitions with no
/// `FeatureFlag` conditions or standalone use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFlagsEnabled;

impl FeatureFlagSource for AllFlagsEnabled {
    fn is_enabled(&self, _name: &str) -> bool {
        true
    }
}

pub fn evaluate(conditions: &[WhenCondition], flags: &dyn FeatureFlagSource) -> bool {
    conditions.iter().all(|cond| match cond {
        WhenCondition::FileExists(path) => path.exists(),
        WhenCondition::EnvExists(expected) => expected
            .iter()
            .all(|(k, v)| std::env::var(k).map(|actual| &actual == v).unwrap_or(false)),
        WhenCondition::FeatureFlag(name) => flags.is_enabled(name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn empty_conditions_pass() {
        assert!(evaluate(&[], &AllFlagsEnabled));
    }

    #[test]
    fn file_exists_checks_the_filesystem() {
        let conditions = vec![WhenCondition::FileExists(PathBuf::from("/nonexistent/definitely-not-there"))];
        assert!(!evaluate(&conditions, &AllFlagsEnabled));

        let conditions = vec![WhenCondition::FileExists(PathBuf::from("/"))];
        assert!(evaluate(&conditions, &AllFlagsEnabled));
    }

    #[test]
    fn env_exists_requires_every_entry_to_match() {
        std::env::set_var("ISUP_WHEN_TEST_VAR", "expected");
        let mut expected = HashMap::new();
        expected.insert("ISUP_WHEN_TEST_VAR".to_string(), "expected".to_string());
        let conditions = vec![WhenCondition::EnvExists(expected)];
        assert!(evaluate(&conditions, &AllFlagsEnabled));

        let mut wrong = HashMap::new();
        wrong.insert("ISUP_WHEN_TEST_VAR".to_string(), "other".to_string());
        let conditions = vec![WhenCondition::EnvExists(wrong)];
        assert!(!evaluate(&conditions, &AllFlagsEnabled));
        std::env::remove_var("ISUP_WHEN_TEST_VAR");
    }

    struct DenyAll;
    impl FeatureFlagSource for DenyAll {
        fn is_enabled(&self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn feature_flag_defers_to_the_flag_source() {
        let conditions = vec![WhenCondition::FeatureFlag("beta".to_string())];
        assert!(evaluate(&conditions, &AllFlagsEnabled));
        assert!(!evaluate(&conditions, &DenyAll));
    }
}
