// SPDX-License-Identifier: MIT

//! Discovery databinding collaborator (SPEC_FULL.md §4.3): expands one
//! [`Definition`]'s runnable and `config_template` across the matches an
//! external discovery source reports, substituting `${var}` / `${ns.var}`
//! placeholders the way the teacher's `runbook::template` interpolates
//! `${name}` references.

use isup_core::Definition;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// `${name}` or `${namespace.name}`, matching the teacher's `VAR_PATTERN`.
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

/// One discovered instance to run a [`Definition`] against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryMatch {
    /// Substitution values available to `${var}` placeholders.
    pub values: HashMap<String, String>,
    /// Labels merged onto the emitted payload for this match only.
    pub extra_labels: HashMap<String, String>,
    /// Opaque entity-rewrite directive forwarded to the emitter unchanged.
    pub entity_rewrite: Option<String>,
}

/// External discovery collaborator (explicit non-goal per SPEC_FULL.md §1):
/// resolves placeholders and produces the per-match value maps that drive
/// fan-out in `Definition::run`.
pub trait DiscoveryBinder: Send + Sync {
    fn matches(&self, def: &Definition) -> Vec<DiscoveryMatch>;
}

/// Fixed set of matches, for tests that don't need real discovery.
#[derive(Debug, Clone, Default)]
pub struct StaticBinder {
    matches: Vec<DiscoveryMatch>,
}

impl StaticBinder {
    pub fn new(matches: Vec<DiscoveryMatch>) -> Self {
        Self { matches }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl DiscoveryBinder for StaticBinder {
    fn matches(&self, _def: &Definition) -> Vec<DiscoveryMatch> {
        self.matches.clone()
    }
}

/// Reference `DiscoveryBinder`: walks the `entities` table and yields one
/// match per entry, each carrying that entity's own variable map untouched
/// (real discovery sources narrow this to the entities actually referenced
/// by the template; this binder always reports all configured entities).
#[derive(Debug, Clone, Default)]
pub struct TemplateBinder {
    entities: Vec<DiscoveryMatch>,
}

impl TemplateBinder {
    pub fn new(entities: Vec<DiscoveryMatch>) -> Self {
        Self { entities }
    }
}

impl DiscoveryBinder for TemplateBinder {
    fn matches(&self, _def: &Definition) -> Vec<DiscoveryMatch> {
        self.entities.clone()
    }
}

/// Substitute every `${var}`/`${ns.var}` reference in `template` using
/// `values`. Unknown references are left as-is, matching the teacher's
/// tolerant `interpolate`.
pub fn interpolate(template: &str, values: &HashMap<String, String>) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            values.get(name).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// `true` if `template` references `${config.path}` anywhere, used to decide
/// whether to fall back to exporting `CONFIG_PATH` (SPEC_FULL.md §4.3 step 3).
pub fn references_config_path(strings: impl IntoIterator<Item = impl AsRef<str>>) -> bool {
    strings.into_iter().any(|s| s.as_ref().contains("${config.path}"))
}
