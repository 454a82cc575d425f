//! File-name validation.
//!
//! The directory is a flat namespace of bare file names. Anything that could
//! address a path outside the serving directory is rejected before it reaches
//! the filesystem.

use crate::error::CoreError;

/// Check that `name` is a bare file name safe to join onto a directory.
pub fn validate_file_name(name: &str) -> Result<(), CoreError> {
    let reason = if name.is_empty() {
        Some("empty")
    } else if name == "." || name == ".." {
        Some("relative path component")
    } else if name.contains('/') || name.contains('\\') {
        Some("contains a path separator")
    } else if name.contains('\0') {
        Some("contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CoreError::InvalidFileName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
