//! Local inventory scan.

use std::fs;
use std::path::Path;

use filemesh_core::FileEntry;

use crate::chunk;
use crate::error::{Result, StoreError};
use crate::fs_store::unix_mtime;
use crate::hashing::hash_file;

/// Default block size: 100 MiB.
pub const DEFAULT_BLOCK_SIZE: u64 = 100 * 1024 * 1024;

/// Extensions never offered for synchronization.
pub const DEFAULT_IGNORED_EXTENSIONS: &[&str] = &["exe", "py", "pyd", "dll"];

/// Configuration for scanning a serving directory.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Files at or above this many bytes are split into blocks.
    pub block_size: u64,
    /// Extensions (without the dot, compared case-insensitively) to skip.
    pub ignored_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            ignored_extensions: DEFAULT_IGNORED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl ScanConfig {
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    /// Whether `name` carries one of the ignored extensions.
    pub fn is_ignored(&self, name: &str) -> bool {
        match Path::new(name).extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self
                .ignored_extensions
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Build the inventory entry for one path, partitioning it when large.
///
/// Returns `None` for anything that is not a regular file.
pub(crate) fn describe(path: &Path, name: &str, config: &ScanConfig) -> Result<Option<FileEntry>> {
    let meta = fs::metadata(path).map_err(|e| StoreError::io(path, e))?;
    if !meta.is_file() {
        return Ok(None);
    }
    let mtime = unix_mtime(&meta).map_err(|e| StoreError::io(path, e))?;

    let block_count = if meta.len() >= config.block_size {
        chunk::partition(path, config.block_size)?.block_count
    } else {
        0
    };

    Ok(Some(FileEntry {
        name: name.to_string(),
        mtime,
        hash: hash_file(path)?,
        block_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_store::{set_mtime, FileStore};
    use crate::BLOCK_CACHE_DIR;
    use filemesh_core::ContentHash;
    use tempfile::TempDir;

    #[test]
    fn test_ignored_extensions() {
        let config = ScanConfig::default();
        assert!(config.is_ignored("setup.exe"));
        assert!(config.is_ignored("script.PY"));
        assert!(config.is_ignored("lib.dll"));
        assert!(!config.is_ignored("notes.txt"));
        assert!(!config.is_ignored("python-notes.md"));
        assert!(!config.is_ignored("Makefile"));
    }

    #[test]
    fn test_scan_reports_small_and_large_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let config = ScanConfig::default().with_block_size(1000);

        std::fs::write(dir.path().join("small.txt"), b"tiny").unwrap();
        set_mtime(&dir.path().join("small.txt"), 1_700_000_000).unwrap();
        std::fs::write(dir.path().join("large.bin"), vec![9u8; 2500]).unwrap();
        std::fs::write(dir.path().join("tool.exe"), b"MZ").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let inventory = store.scan(&config).unwrap();
        let names: Vec<&str> = inventory.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["large.bin", "small.txt"]);

        let large = &inventory[0];
        assert_eq!(large.block_count, 3);
        assert_eq!(large.hash, ContentHash::hash(&vec![9u8; 2500]));
        assert!(store.block_path("large.bin", 3).unwrap().exists());

        let small = &inventory[1];
        assert_eq!(small.block_count, 0);
        assert_eq!(small.mtime, 1_700_000_000);
        assert_eq!(small.hash, ContentHash::hash(b"tiny"));
    }

    #[test]
    fn test_scan_file_equal_to_block_size_is_partitioned() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("exact.bin"), vec![1u8; 1000]).unwrap();

        let inventory = store.scan(&ScanConfig::default().with_block_size(1000)).unwrap();
        assert_eq!(inventory[0].block_count, 1);
    }

    #[test]
    fn test_scan_skips_block_cache() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("large.bin"), vec![3u8; 4000]).unwrap();
        let config = ScanConfig::default().with_block_size(1000);

        store.scan(&config).unwrap();
        assert!(dir.path().join(BLOCK_CACHE_DIR).is_dir());

        let again = store.scan(&config).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].name, "large.bin");
    }
}
