//! Thread-safe set of request keys that have already been scheduled.

use dashmap::DashSet;

/// A concurrent "seen" set.
///
/// `check_and_insert` is a single atomic operation: two tasks racing on the
/// same key can never both observe it as new.
#[derive(Debug, Default)]
pub struct VisitedSet {
    keys: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` and reports whether it was already present.
    pub fn check_and_insert(&self, key: &str) -> bool {
        if self.keys.contains(key) {
            return true;
        }
        !self.keys.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
