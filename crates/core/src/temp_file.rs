// SPDX-License-Identifier: MIT

//! Injectable temp-file creation for config template materialisation.
//!
//! Kept as a trait so `Definition::run` never touches the real filesystem in
//! unit tests; the concrete OS-temp-dir implementation (with the purge-by-cap
//! routine from SPEC_FULL.md §6) lives in `isup-adapters`, which is allowed to
//! depend on `isup-core` but not vice versa.

use std::path::PathBuf;

/// A temp file created for one run of one discovery match.
///
/// Dropping this value does *not* delete the file — deletion is driven
/// explicitly by the runner once the corresponding `done` signal fires
/// (SPEC_FULL.md §3 Lifecycles), not by RAII, because the file must outlive
/// the `TempFile` value while the child process has it open.
#[derive(Debug, Clone)]
pub struct TempFile {
    pub path: PathBuf,
}

/// Creates and removes temp files used to materialise `config_template`.
pub trait TempFileFactory: Send + Sync {
    /// Create (or reuse, if `dedup_key` names an existing file) a temp file
    /// containing `contents`. `dedup_key` is a filename-safe string derived
    /// from the content hash of the template plus the match's value map, per
    /// the temp-file-collision resolution in SPEC_FULL.md §9.
    fn create(&self, dedup_key: &str, contents: &[u8]) -> std::io::Result<TempFile>;

    /// Remove a previously created temp file. Idempotent: removing an
    /// already-removed file is not an error.
    fn remove(&self, file: &TempFile) -> std::io::Result<()>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{TempFile, TempFileFactory};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;

    /// In-memory temp file factory: records creates/removes without touching disk.
    #[derive(Clone, Default)]
    pub struct FakeTempFileFactory {
        live: Arc<Mutex<HashSet<PathBuf>>>,
    }

    impl FakeTempFileFactory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_live(&self, path: &std::path::Path) -> bool {
            self.live.lock().contains(path)
        }

        pub fn live_count(&self) -> usize {
            self.live.lock().len()
        }
    }

    impl TempFileFactory for FakeTempFileFactory {
        fn create(&self, dedup_key: &str, _contents: &[u8]) -> std::io::Result<TempFile> {
            let path = PathBuf::from(format!("/fake-tmp/{dedup_key}"));
            self.live.lock().insert(path.clone());
            Ok(TempFile { path })
        }

        fn remove(&self, file: &TempFile) -> std::io::Result<()> {
            self.live.lock().remove(&file.path);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTempFileFactory;
