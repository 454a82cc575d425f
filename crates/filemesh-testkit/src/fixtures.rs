//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use filemesh_store::{set_mtime, unix_mtime, FileStore};
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// A temporary serving directory. Removed when dropped.
pub struct ServingDir {
    dir: TempDir,
    pub store: FileStore,
}

impl ServingDir {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let store = FileStore::open(dir.path()).expect("open store");
        Self { dir, store }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `name` with `contents` and stamp it with `mtime` Unix seconds.
    pub fn write_file(&self, name: &str, contents: &[u8], mtime: i64) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write fixture file");
        set_mtime(&path, mtime).expect("set fixture mtime");
        path
    }

    /// Contents of `name`, or `None` if it does not exist.
    pub fn read_file(&self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.join(name)).ok()
    }

    /// Modification time of `name` in Unix seconds.
    pub fn mtime(&self, name: &str) -> Option<i64> {
        let meta = fs::metadata(self.join(name)).ok()?;
        unix_mtime(&meta).ok()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.join(name).exists()
    }
}

impl Default for ServingDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic pseudo-random bytes, so failures reproduce.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let dir = ServingDir::new();
        dir.write_file("a.txt", b"abc", 1_234_567);
        assert_eq!(dir.read_file("a.txt").unwrap(), b"abc");
        assert_eq!(dir.mtime("a.txt"), Some(1_234_567));
        assert!(dir.read_file("missing").is_none());
    }

    #[test]
    fn test_random_bytes_deterministic() {
        assert_eq!(random_bytes(64, 7), random_bytes(64, 7));
        assert_ne!(random_bytes(64, 7), random_bytes(64, 8));
    }
}
