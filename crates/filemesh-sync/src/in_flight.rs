//! Set of file names with a download in progress.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Names currently being fetched, shared between the heartbeat loop and
/// fetch tasks.
///
/// A name is claimed through [`InFlight::try_claim`] and released when the
/// returned guard drops, whether the fetch succeeded, gave up, or panicked.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    names: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`, or `None` if a fetch for it is already running.
    pub fn try_claim(&self, name: &str) -> Option<InFlightGuard> {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if names.insert(name.to_string()) {
            Some(InFlightGuard {
                names: Arc::clone(&self.names),
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the claimed names.
    pub fn snapshot(&self) -> Vec<String> {
        let names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<String> = names.iter().cloned().collect();
        out.sort();
        out
    }
}

/// Releases its name from the in-flight set on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    names: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl InFlightGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_release() {
        let set = InFlight::new();
        let guard = set.try_claim("a.txt").unwrap();
        assert!(set.contains("a.txt"));
        assert!(set.try_claim("a.txt").is_none());
        assert_eq!(guard.name(), "a.txt");

        drop(guard);
        assert!(set.is_empty());
        assert!(set.try_claim("a.txt").is_some());
    }

    #[test]
    fn test_independent_names() {
        let set = InFlight::new();
        let _a = set.try_claim("a").unwrap();
        let _b = set.try_claim("b").unwrap();
        assert_eq!(set.snapshot(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_released_when_task_panics() {
        let set = InFlight::new();
        let guard = set.try_claim("boom").unwrap();
        let handle = std::thread::spawn(move || {
            let _guard = guard;
            panic!("fetch failed");
        });
        assert!(handle.join().is_err());
        assert!(!set.contains("boom"));
    }
}
