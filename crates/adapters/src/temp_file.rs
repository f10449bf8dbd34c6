// SPDX-License-Identifier: MIT

//! OS-temp-dir-backed [`TempFileFactory`], plus the purge-by-cap routine
//! that bounds how many materialised config templates accumulate on disk
//! (SPEC_FULL.md §6 "Temp file lifecycle").

use isup_core::{TempFile, TempFileFactory};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const PREFIX: &str = "isup-";

/// Creates temp files under a configured directory (the OS temp dir by
/// default), named deterministically from the caller-supplied `dedup_key`
/// so that two runs with identical template bytes and match values reuse
/// the same path instead of racing to create distinct ones (SPEC_FULL.md §9
/// Open Question: temp-file collisions).
#[derive(Debug, Clone)]
pub struct OsTempFileFactory {
    dir: PathBuf,
}

impl Default for OsTempFileFactory {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl OsTempFileFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, dedup_key: &str) -> PathBuf {
        self.dir.join(format!("{PREFIX}{dedup_key}"))
    }
}

impl TempFileFactory for OsTempFileFactory {
    fn create(&self, dedup_key: &str, contents: &[u8]) -> io::Result<TempFile> {
        let path = self.path_for(dedup_key);
        // Reuse an existing file with the same dedup key verbatim: same
        // template bytes and match values hash to the same key, so the
        // contents are already correct.
        if !path.exists() {
            fs::create_dir_all(&self.dir)?;
            fs::write(&path, contents)?;
        }
        Ok(TempFile { path })
    }

    fn remove(&self, file: &TempFile) -> io::Result<()> {
        match fs::remove_file(&file.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Paths referenced from `contents` that look like a lua-filter file
/// (SPEC_FULL.md §6: "any lua-filter files referenced from them are removed
/// together"). Relative references resolve against `dir`, the same
/// directory the temp file itself lives in.
fn companion_lua_files(dir: &Path, contents: &[u8]) -> Vec<PathBuf> {
    let text = String::from_utf8_lossy(contents);
    text.split_whitespace()
        .filter(|token| token.ends_with(".lua"))
        .map(|token| {
            let path = Path::new(token);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                dir.join(path)
            }
        })
        .collect()
}

/// Delete the oldest-by-mtime files under `dir` carrying [`PREFIX`] until at
/// most `cap` remain, taking any lua-filter file a purged template references
/// with it. Called periodically by the daemon to bound disk usage from
/// abandoned temp files (SPEC_FULL.md §6).
pub fn purge_oldest_beyond_cap(dir: &Path, cap: usize) -> io::Result<usize> {
    let mut entries: Vec<(PathBuf, SystemTime)> = Vec::new();
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    for entry in read_dir {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(PREFIX) {
            continue;
        }
        let metadata = entry.metadata()?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((entry.path(), modified));
    }

    if entries.len() <= cap {
        return Ok(0);
    }

    entries.sort_by_key(|(_, modified)| *modified);
    let excess = entries.len() - cap;
    let mut removed = 0;
    for (path, _) in entries.into_iter().take(excess) {
        if let Ok(contents) = fs::read(&path) {
            for lua in companion_lua_files(dir, &contents) {
                match fs::remove_file(&lua) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(path = %lua.display(), error = %e, "failed to purge companion lua-filter file");
                    }
                }
            }
        }

        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to purge temp file");
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_is_idempotent_for_same_dedup_key() {
        let dir = tempdir().unwrap();
        let factory = OsTempFileFactory::new(dir.path());
        let a = factory.create("abc123", b"hello").unwrap();
        let b = factory.create("abc123", b"hello").unwrap();
        assert_eq!(a.path, b.path);
        assert_eq!(fs::read(&a.path).unwrap(), b"hello");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let factory = OsTempFileFactory::new(dir.path());
        let file = factory.create("key", b"x").unwrap();
        factory.remove(&file).unwrap();
        factory.remove(&file).unwrap();
    }

    #[test]
    fn purge_keeps_cap_newest_by_mtime() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            let path = dir.path().join(format!("{PREFIX}{i}"));
            fs::write(&path, b"x").unwrap();
            // Ensure distinct mtimes on filesystems with coarse resolution.
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let removed = purge_oldest_beyond_cap(dir.path(), 2).unwrap();
        assert_eq!(removed, 3);
        let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn purge_removes_companion_lua_filter_file() {
        let dir = tempdir().unwrap();
        let lua_path = dir.path().join("filter.lua");
        fs::write(&lua_path, b"-- filter").unwrap();
        let template_path = dir.path().join(format!("{PREFIX}0"));
        fs::write(&template_path, format!("lua_filter {}\n", lua_path.display())).unwrap();

        let removed = purge_oldest_beyond_cap(dir.path(), 0).unwrap();
        assert_eq!(removed, 2);
        assert!(!template_path.exists());
        assert!(!lua_path.exists());
    }

    #[test]
    fn purge_ignores_files_without_prefix() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();
        let removed = purge_oldest_beyond_cap(dir.path(), 0).unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn purge_on_missing_dir_is_a_noop() {
        let removed = purge_oldest_beyond_cap(Path::new("/nonexistent/isup-dir"), 0).unwrap();
        assert_eq!(removed, 0);
    }
}
