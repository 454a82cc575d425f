//! Peer liveness table and file directory.
//!
//! Two tables behind two independent locks. No method holds both at once,
//! and neither is held across I/O.

use std::collections::btree_map::Entry;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use filemesh_core::{validate_file_name, Directory, FileEntry, FileRecord, HeartbeatRequest, PeerId};
use tracing::{debug, info, warn};

/// When a reported file replaces the existing directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Replace when the existing record's mtime is strictly greater than
    /// the reported one.
    #[default]
    ReplaceWhenOlder,
    /// Replace when the reported mtime is strictly greater than the
    /// existing record's.
    KeepNewest,
}

impl MergePolicy {
    /// Whether `reported` should replace `existing`.
    pub fn should_replace(self, existing: &FileRecord, reported: &FileEntry) -> bool {
        match self {
            MergePolicy::ReplaceWhenOlder => existing.mtime > reported.mtime,
            MergePolicy::KeepNewest => reported.mtime > existing.mtime,
        }
    }
}

/// What a heartbeat changed in the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub rejected: usize,
}

/// In-memory tracker state. Lost on restart.
#[derive(Debug, Default)]
pub struct TrackerState {
    peers: Mutex<HashMap<PeerId, Instant>>,
    files: Mutex<Directory>,
    policy: MergePolicy,
}

impl TrackerState {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Apply a heartbeat from `source_ip` and return the directory snapshot.
    pub fn handle_heartbeat(&self, source_ip: IpAddr, request: &HeartbeatRequest) -> Directory {
        self.handle_heartbeat_at(source_ip, request, Instant::now()).0
    }

    /// [`handle_heartbeat`](Self::handle_heartbeat) with an explicit clock.
    pub fn handle_heartbeat_at(
        &self,
        source_ip: IpAddr,
        request: &HeartbeatRequest,
        now: Instant,
    ) -> (Directory, MergeSummary) {
        let peer = PeerId::new(source_ip, request.port);
        if self.peers().insert(peer, now).is_none() {
            info!(%peer, "peer joined");
        }

        let mut summary = MergeSummary::default();
        let mut files = self.files();
        for entry in &request.files {
            if let Err(e) = validate_file_name(&entry.name) {
                warn!(%peer, error = %e, "rejecting file entry");
                summary.rejected += 1;
                continue;
            }
            match files.entry(entry.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(FileRecord::from_entry(peer, entry));
                    summary.inserted += 1;
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get();
                    if self.policy.should_replace(existing, entry) {
                        debug!(
                            name = %entry.name,
                            from = %existing.owner(),
                            to = %peer,
                            old_mtime = existing.mtime,
                            new_mtime = entry.mtime,
                            "replacing directory record"
                        );
                        slot.insert(FileRecord::from_entry(peer, entry));
                        summary.replaced += 1;
                    }
                }
            }
        }
        (files.clone(), summary)
    }

    /// Evict peers silent for longer than `ttl`, along with every record
    /// they own. Returns the evicted peers.
    pub fn sweep_at(&self, now: Instant, ttl: Duration) -> Vec<PeerId> {
        let evicted: Vec<PeerId> = {
            let mut peers = self.peers();
            let expired: Vec<PeerId> = peers
                .iter()
                .filter(|(_, seen)| now.saturating_duration_since(**seen) > ttl)
                .map(|(peer, _)| *peer)
                .collect();
            for peer in &expired {
                peers.remove(peer);
            }
            expired
        };
        if evicted.is_empty() {
            return evicted;
        }

        let gone: HashSet<PeerId> = evicted.iter().copied().collect();
        let removed = {
            let mut files = self.files();
            let before = files.len();
            files.retain(|_, record| !gone.contains(&record.owner()));
            before - files.len()
        };
        for peer in &evicted {
            info!(%peer, "peer evicted");
        }
        debug!(peers = evicted.len(), records = removed, "sweep purged records");
        evicted
    }

    /// Snapshot of the file directory.
    pub fn directory(&self) -> Directory {
        self.files().clone()
    }

    pub fn peer_count(&self) -> usize {
        self.peers().len()
    }

    pub fn is_live(&self, peer: &PeerId) -> bool {
        self.peers().contains_key(peer)
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, Instant>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn files(&self) -> MutexGuard<'_, Directory> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filemesh_core::ContentHash;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    const TTL: Duration = Duration::from_secs(180);

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn heartbeat(port: u16, files: &[(&str, i64)]) -> HeartbeatRequest {
        HeartbeatRequest {
            port,
            files: files
                .iter()
                .map(|(name, mtime)| FileEntry {
                    name: name.to_string(),
                    mtime: *mtime,
                    hash: ContentHash::hash(format!("{name}{mtime}").as_bytes()),
                    block_count: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_first_report_inserts_record() {
        let state = TrackerState::default();
        let dir = state.handle_heartbeat(ip(1), &heartbeat(8000, &[("x.txt", 10)]));

        let record = &dir["x.txt"];
        assert_eq!(record.owner(), PeerId::new(ip(1), 8000));
        assert_eq!(record.mtime, 10);
        assert_eq!(record.block_count, 0);
        assert_eq!(state.peer_count(), 1);
    }

    #[test]
    fn test_literal_rule_replaces_with_older_report() {
        let state = TrackerState::new(MergePolicy::ReplaceWhenOlder);
        state.handle_heartbeat(ip(1), &heartbeat(8000, &[("x.txt", 10)]));
        let dir = state.handle_heartbeat(ip(2), &heartbeat(8000, &[("x.txt", 5)]));

        assert_eq!(dir["x.txt"].owner(), PeerId::new(ip(2), 8000));
        assert_eq!(dir["x.txt"].mtime, 5);
    }

    #[test]
    fn test_literal_rule_keeps_record_on_newer_report() {
        let state = TrackerState::new(MergePolicy::ReplaceWhenOlder);
        state.handle_heartbeat(ip(1), &heartbeat(8000, &[("x.txt", 10)]));
        let dir = state.handle_heartbeat(ip(2), &heartbeat(8000, &[("x.txt", 15)]));

        assert_eq!(dir["x.txt"].owner(), PeerId::new(ip(1), 8000));
        assert_eq!(dir["x.txt"].mtime, 10);
    }

    #[test]
    fn test_keep_newest_policy() {
        let state = TrackerState::new(MergePolicy::KeepNewest);
        state.handle_heartbeat(ip(1), &heartbeat(8000, &[("x.txt", 10)]));

        let dir = state.handle_heartbeat(ip(2), &heartbeat(8000, &[("x.txt", 5)]));
        assert_eq!(dir["x.txt"].mtime, 10);

        let dir = state.handle_heartbeat(ip(3), &heartbeat(8000, &[("x.txt", 15)]));
        assert_eq!(dir["x.txt"].owner(), PeerId::new(ip(3), 8000));
        assert_eq!(dir["x.txt"].mtime, 15);
    }

    #[test]
    fn test_equal_mtime_never_replaces() {
        for policy in [MergePolicy::ReplaceWhenOlder, MergePolicy::KeepNewest] {
            let state = TrackerState::new(policy);
            state.handle_heartbeat(ip(1), &heartbeat(8000, &[("x.txt", 10)]));
            let dir = state.handle_heartbeat(ip(2), &heartbeat(8000, &[("x.txt", 10)]));
            assert_eq!(dir["x.txt"].owner(), PeerId::new(ip(1), 8000));
        }
    }

    #[test]
    fn test_peers_on_one_host_are_distinct() {
        let state = TrackerState::default();
        state.handle_heartbeat(ip(1), &heartbeat(8000, &[]));
        state.handle_heartbeat(ip(1), &heartbeat(8001, &[]));
        assert_eq!(state.peer_count(), 2);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let state = TrackerState::default();
        let (dir, summary) = state.handle_heartbeat_at(
            ip(1),
            &heartbeat(8000, &[("../etc/passwd", 1), ("ok.txt", 1)]),
            Instant::now(),
        );
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.inserted, 1);
        assert_eq!(dir.keys().collect::<Vec<_>>(), vec!["ok.txt"]);
    }

    #[test]
    fn test_silent_peer_evicted_with_its_records() {
        let state = TrackerState::default();
        let t0 = Instant::now();
        state.handle_heartbeat_at(ip(1), &heartbeat(8000, &[("a.txt", 1), ("b.txt", 1)]), t0);
        state.handle_heartbeat_at(ip(2), &heartbeat(8000, &[("c.txt", 1)]), t0);
        // Peer 2 stays alive.
        let later = t0 + Duration::from_secs(170);
        state.handle_heartbeat_at(ip(2), &heartbeat(8000, &[("c.txt", 1)]), later);

        let evicted = state.sweep_at(t0 + Duration::from_secs(181), TTL);
        assert_eq!(evicted, vec![PeerId::new(ip(1), 8000)]);
        assert!(!state.is_live(&PeerId::new(ip(1), 8000)));
        assert_eq!(state.directory().keys().collect::<Vec<_>>(), vec!["c.txt"]);
    }

    #[test]
    fn test_peer_within_ttl_survives() {
        let state = TrackerState::default();
        let t0 = Instant::now();
        state.handle_heartbeat_at(ip(1), &heartbeat(8000, &[("a.txt", 1)]), t0);

        assert!(state.sweep_at(t0 + Duration::from_secs(179), TTL).is_empty());
        assert!(state.sweep_at(t0 + TTL, TTL).is_empty());
        assert_eq!(state.directory().len(), 1);
    }

    #[test]
    fn test_replaced_record_survives_old_owner_eviction() {
        let state = TrackerState::default();
        let t0 = Instant::now();
        state.handle_heartbeat_at(ip(1), &heartbeat(8000, &[("x.txt", 10)]), t0);
        let t1 = t0 + Duration::from_secs(100);
        state.handle_heartbeat_at(ip(2), &heartbeat(8000, &[("x.txt", 5)]), t1);

        state.sweep_at(t0 + Duration::from_secs(200), TTL);
        let dir = state.directory();
        assert_eq!(dir["x.txt"].owner(), PeerId::new(ip(2), 8000));
    }

    proptest! {
        #[test]
        fn directory_only_holds_live_owners(
            reports in proptest::collection::vec((1u8..6, 0u64..400, 0usize..4), 1..30)
        ) {
            let state = TrackerState::default();
            let t0 = Instant::now();
            for (host, at, file) in &reports {
                let name = format!("f{file}.txt");
                state.handle_heartbeat_at(
                    ip(*host),
                    &heartbeat(8000, &[(name.as_str(), *at as i64)]),
                    t0 + Duration::from_secs(*at),
                );
            }
            state.sweep_at(t0 + Duration::from_secs(400), TTL);
            for record in state.directory().values() {
                prop_assert!(state.is_live(&record.owner()));
            }
        }
    }
}
