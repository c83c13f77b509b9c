//! Bounded set of recently accepted `client_msg_id`s.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Default maximum number of remembered ids.
pub const DEFAULT_MAX_SEEN_IDS: usize = 500;

/// Default retention horizon (24 hours).
pub const DEFAULT_RETENTION: time::Duration = time::Duration::hours(24);

/// Eviction limits for [`SeenIds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_entries: usize,
    pub horizon: time::Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_SEEN_IDS,
            horizon: DEFAULT_RETENTION,
        }
    }
}

/// One remembered id and the unix time it was accepted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenEntry {
    pub id: CompactString,
    pub seen_at: i64,
}

/// Insertion-ordered id set. Entries leave from the front, either because
/// they are older than the horizon or because the set is over capacity.
#[derive(Debug, Clone, Default)]
pub struct SeenIds {
    entries: VecDeque<SeenEntry>,
    index: HashSet<CompactString>,
    policy: RetentionPolicy,
}

impl SeenIds {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            index: HashSet::new(),
            policy,
        }
    }

    /// Rebuild from persisted entries, dropping duplicates and anything the
    /// policy would already have evicted at `now`.
    pub fn from_entries(
        entries: impl IntoIterator<Item = SeenEntry>,
        policy: RetentionPolicy,
        now: i64,
    ) -> Self {
        let mut seen = Self::new(policy);
        for entry in entries {
            if seen.index.insert(entry.id.clone()) {
                seen.entries.push_back(entry);
            }
        }
        seen.evict(now);
        seen
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record `id` as accepted at `now`. Returns `false` if it was already
    /// present.
    pub fn insert(&mut self, id: &str, now: i64) -> bool {
        self.evict(now);
        if self.index.contains(id) {
            return false;
        }
        let id = CompactString::from(id);
        self.index.insert(id.clone());
        self.entries.push_back(SeenEntry { id, seen_at: now });
        self.evict(now);
        true
    }

    /// Drop entries past the horizon, then trim to capacity.
    pub fn evict(&mut self, now: i64) {
        let cutoff = now.saturating_sub(self.policy.horizon.whole_seconds());
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.seen_at < cutoff || self.entries.len() > self.policy.max_entries)
        {
            if let Some(entry) = self.entries.pop_front() {
                self.index.remove(&entry.id);
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &SeenEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }
}
