// SPDX-License-Identifier: MIT

//! Content-addressed fingerprint for [`crate::definition::Definition`].
//!
//! Mirrors the teacher's `IdBuf` idiom of a small fixed-size, `Copy`,
//! `Display`-as-hex identifier rather than deriving `Hash` on the whole struct
//! (which would make the cache sensitive to incidental field changes).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of bytes kept from the underlying SHA-256 digest.
///
/// 16 bytes (128 bits) is collision-resistant enough for a cache keyed by a
/// bounded number of locally-loaded integration definitions.
const HASH_LEN: usize = 16;

/// Stable, collision-resistant fingerprint of a `Definition`'s semantic fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionHash([u8; HASH_LEN]);

impl DefinitionHash {
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for DefinitionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefinitionHash({})", self.to_hex())
    }
}

impl fmt::Display for DefinitionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incrementally fed into by callers to build a [`DefinitionHash`] or any
/// other content-addressed fingerprint (e.g. temp-file names).
pub struct Hasher(Sha256);

impl Hasher {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(bytes);
        self
    }

    /// Feed a `key=value\0` pair, keeping field hashing order-independent
    /// callers stable (maps are sorted by the caller before hashing).
    pub fn update_field(&mut self, key: &str, value: &str) -> &mut Self {
        self.0.update(key.as_bytes());
        self.0.update(b"=");
        self.0.update(value.as_bytes());
        self.0.update(b"\0");
        self
    }

    pub fn finish(self) -> DefinitionHash {
        let digest = self.0.finalize();
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest[..HASH_LEN]);
        DefinitionHash(out)
    }

    /// Hex-encoded digest truncated to `HASH_LEN` bytes, for callers (like the
    /// temp-file factory) that want a filename-safe string without a full
    /// `DefinitionHash`.
    pub fn finish_hex(self) -> String {
        self.finish().to_hex()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        let a = Hasher::new().update_field("name", "foo").finish();
        let b = Hasher::new().update_field("name", "foo").finish();
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_different_hash() {
        let a = Hasher::new().update_field("name", "foo").finish();
        let b = Hasher::new().update_field("name", "bar").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn field_order_matters_within_a_single_hasher() {
        // Order sensitivity is intentional: callers sort maps before hashing
        // so that semantically-equal definitions always hash equal.
        let a = Hasher::new().update_field("a", "1").update_field("b", "2").finish();
        let b = Hasher::new().update_field("b", "2").update_field("a", "1").finish();
        assert_ne!(a, b);
    }
}
