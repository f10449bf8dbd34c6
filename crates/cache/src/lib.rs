// SPDX-License-Identifier: MIT

//! Content-addressed registry of [`Definition`]s per configuration file,
//! with diff-and-apply semantics so a reloaded config file can add and
//! remove integration instances coherently (SPEC_FULL.md §4.2).

use isup_core::{Definition, DefinitionHash};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Currently infallible: every `Cache` operation that can fail today simply
/// cannot occur given the invariants this crate upholds. Kept as a real type
/// (rather than `()`) so call sites already return `Result` and don't need
/// to change if a fallible path is added later.
#[derive(Debug, Error)]
pub enum CacheError {}

/// A working set prepared for diff-and-apply against one config file
/// (SPEC_FULL.md §3 "ConfigDefinitions").
#[derive(Debug, Clone)]
pub struct ConfigDefinitions {
    config_name: String,
    current: HashSet<DefinitionHash>,
    added: HashMap<DefinitionHash, Definition>,
}

impl ConfigDefinitions {
    fn new(config_name: String, current: HashSet<DefinitionHash>) -> Self {
        Self { config_name, current, added: HashMap::new() }
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Record `def` as part of the intended new set. Returns `true` if
    /// `def`'s hash was not already installed for this config (i.e. this is
    /// a genuinely new definition, not a re-declaration of an existing one).
    pub fn add(&mut self, def: Definition) -> bool {
        let hash = def.hash();
        let is_new = !self.current.contains(&hash);
        self.added.insert(hash, def);
        is_new
    }

    pub fn added_len(&self) -> usize {
        self.added.len()
    }
}

#[derive(Default)]
struct CacheInner {
    hashes: HashMap<String, HashSet<DefinitionHash>>,
    definitions: HashMap<DefinitionHash, Definition>,
}

/// Two mappings under one lock: `config_name → set<hash>` and
/// `hash → Definition` (SPEC_FULL.md §3 "Cache").
///
/// Invariants: every hash in any `hashes[c]` has a corresponding entry in
/// `definitions`; removing the last reference to a hash removes it from
/// `definitions` too.
#[derive(Default)]
pub struct Cache {
    inner: RwLock<CacheInner>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_config_names(&self) -> Vec<String> {
        self.inner.read().hashes.keys().cloned().collect()
    }

    pub fn get_definitions(&self, config_name: &str) -> Vec<Definition> {
        let inner = self.inner.read();
        inner
            .hashes
            .get(config_name)
            .into_iter()
            .flatten()
            .filter_map(|hash| inner.definitions.get(hash).cloned())
            .collect()
    }

    /// Seed a [`ConfigDefinitions`] with the currently-installed hash set
    /// for `config_name`, ready for callers to `add` the freshly-parsed
    /// definitions into.
    pub fn take_config(&self, config_name: impl Into<String>) -> ConfigDefinitions {
        let config_name = config_name.into();
        let current = self.inner.read().hashes.get(&config_name).cloned().unwrap_or_default();
        ConfigDefinitions::new(config_name, current)
    }

    /// Atomically install every hash in `cfg_defs.added` not already current,
    /// remove every current hash not present in `added`, and return the
    /// removed hashes so callers can terminate their runners.
    pub fn apply_config(&self, cfg_defs: ConfigDefinitions) -> Vec<DefinitionHash> {
        let ConfigDefinitions { config_name, current, added } = cfg_defs;
        let mut inner = self.inner.write();

        let new_hashes: HashSet<DefinitionHash> = added.keys().copied().collect();

        for (hash, def) in added {
            inner.definitions.entry(hash).or_insert(def);
        }

        let removed: Vec<DefinitionHash> = current.difference(&new_hashes).copied().collect();
        for hash in &removed {
            let still_referenced =
                inner.hashes.iter().any(|(name, hashes)| *name != config_name && hashes.contains(hash));
            if !still_referenced {
                inner.definitions.remove(hash);
            }
        }

        if new_hashes.is_empty() {
            inner.hashes.remove(&config_name);
        } else {
            inner.hashes.insert(config_name, new_hashes);
        }

        removed
    }
}
