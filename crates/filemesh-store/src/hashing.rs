//! Streaming content hash of files on disk.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use filemesh_core::{ContentHash, ContentHasher};

use crate::error::{Result, StoreError};

const READ_BUFFER: usize = 64 * 1024;

/// Hash the full content of the regular file at `path`.
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let mut file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let meta = file.metadata().map_err(|e| StoreError::io(path, e))?;
    if !meta.is_file() {
        return Err(StoreError::NotAFile(path.to_path_buf()));
    }

    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::io(path, e)),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}
