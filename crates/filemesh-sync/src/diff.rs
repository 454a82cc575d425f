//! Deciding which directory entries a peer needs to fetch.

use std::collections::HashMap;

use filemesh_core::{validate_file_name, Directory, FileEntry, FileRecord, PeerId};
use tracing::{debug, warn};

/// A directory record the local inventory is missing or behind on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFetch {
    pub name: String,
    pub record: FileRecord,
    /// The outdated local copy to delete before fetching, if any.
    pub stale_local: Option<FileEntry>,
}

impl PlannedFetch {
    /// Blocks to clear before the replacement arrives: enough to cover both
    /// the local copy's and the incoming file's block caches.
    pub fn blocks_to_clear(&self) -> u64 {
        let local = self.stale_local.as_ref().map_or(0, |e| e.block_count);
        local.max(self.record.block_count)
    }
}

/// Compare the directory against the local inventory.
///
/// A record is needed when the file is absent locally or the local copy has
/// a smaller mtime. Records owned by `self_id` and records with unusable
/// names are skipped. In-flight filtering is the caller's job.
pub fn plan_fetches(
    directory: &Directory,
    local: &[FileEntry],
    self_id: Option<PeerId>,
) -> Vec<PlannedFetch> {
    let by_name: HashMap<&str, &FileEntry> =
        local.iter().map(|entry| (entry.name.as_str(), entry)).collect();

    let mut planned = Vec::new();
    for (name, record) in directory {
        if let Err(e) = validate_file_name(name) {
            warn!(name, error = %e, "ignoring directory entry");
            continue;
        }
        if Some(record.owner()) == self_id {
            continue;
        }
        match by_name.get(name.as_str()) {
            Some(entry) if entry.mtime >= record.mtime => {
                debug!(name, local = entry.mtime, remote = record.mtime, "up to date");
            }
            Some(entry) => planned.push(PlannedFetch {
                name: name.clone(),
                record: record.clone(),
                stale_local: Some((*entry).clone()),
            }),
            None => planned.push(PlannedFetch {
                name: name.clone(),
                record: record.clone(),
                stale_local: None,
            }),
        }
    }
    planned
}
