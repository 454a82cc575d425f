//! The serving directory of one peer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use filemesh_core::{validate_file_name, BlockIndex, FileEntry};
use filetime::FileTime;
use tracing::{debug, warn};

use crate::chunk::{self, BLOCK_CACHE_DIR};
use crate::error::{Result, StoreError};
use crate::hashing::hash_file;
use crate::inventory::{self, ScanConfig};

/// Suffix of staged downloads inside the block cache.
const STAGING_SUFFIX: &str = ".download";

/// A peer's serving directory plus its block cache.
///
/// Every name passed in is validated as a bare file name, so resolved paths
/// never leave the root.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the serving directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `MEtemp` block cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(BLOCK_CACHE_DIR)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        let dir = self.cache_dir();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))
    }

    /// Path of an original file.
    pub fn file_path(&self, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;
        Ok(self.root.join(name))
    }

    /// Path of block `index` of `name`.
    pub fn block_path(&self, name: &str, index: BlockIndex) -> Result<PathBuf> {
        chunk::block_path(&self.file_path(name)?, index)
    }

    /// Prefix shared by all blocks of `name`.
    pub fn block_prefix(&self, name: &str) -> Result<PathBuf> {
        chunk::block_prefix(&self.file_path(name)?)
    }

    /// What a block request resolves to: the file itself for index 0,
    /// otherwise the cached block.
    pub fn resolve(&self, name: &str, index: BlockIndex) -> Result<PathBuf> {
        if index == 0 {
            self.file_path(name)
        } else {
            self.block_path(name, index)
        }
    }

    /// Where a download of `name` is assembled before verification.
    pub fn staging_path(&self, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;
        Ok(self.cache_dir().join(format!("{name}{STAGING_SUFFIX}")))
    }

    /// Remove the original file and up to `block_count` of its blocks.
    ///
    /// Already-missing files are not an error.
    pub fn remove_file_and_blocks(&self, name: &str, block_count: u64) -> Result<()> {
        let path = self.file_path(name)?;
        if chunk::remove_if_exists(&path)? {
            debug!(name, "removed local file");
        }
        chunk::delete_blocks(&path, block_count)?;
        Ok(())
    }

    /// Remove a staged download, if any.
    pub fn discard_staging(&self, name: &str) -> Result<()> {
        chunk::remove_if_exists(&self.staging_path(name)?)?;
        Ok(())
    }

    /// Move a verified staged download into the serving directory and stamp
    /// it with the advertised modification time.
    pub fn install(&self, name: &str, mtime: i64) -> Result<PathBuf> {
        let staged = self.staging_path(name)?;
        let target = self.file_path(name)?;
        fs::rename(&staged, &target).map_err(|e| StoreError::io(&staged, e))?;
        set_mtime(&target, mtime)?;
        Ok(target)
    }

    /// Hash of whatever a block request for (`name`, `index`) resolves to.
    pub fn hash_target(&self, name: &str, index: BlockIndex) -> Result<filemesh_core::ContentHash> {
        hash_file(&self.resolve(name, index)?)
    }

    /// Scan the serving directory into an inventory.
    ///
    /// Files that disappear or fail mid-scan are reported and skipped.
    pub fn scan(&self, config: &ScanConfig) -> Result<Vec<FileEntry>> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut files = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to read directory entry");
                    continue;
                }
            };
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                debug!(path = %entry.path().display(), "skipping non UTF-8 name");
                continue;
            };
            if config.is_ignored(&name) || validate_file_name(&name).is_err() {
                continue;
            }

            match inventory::describe(&entry.path(), &name, config) {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err(e) => warn!(name, error = %e, "skipping file during scan"),
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

/// Modification time in whole Unix seconds.
pub fn unix_mtime(meta: &fs::Metadata) -> std::io::Result<i64> {
    let modified = meta.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    })
}

/// Set a file's modification time to `secs` Unix seconds.
pub fn set_mtime(path: &Path, secs: i64) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0))
        .map_err(|e| StoreError::io(path, e))
}
