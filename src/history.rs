use std::collections::VecDeque;

use crate::raster::Snapshot;

// ============================================================================
// HISTORY MANAGER - Bounded list of committed snapshots with a pinned original
// ============================================================================

/// Default number of entries, the pinned original included.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;
/// The original plus at least one commit.
pub const MIN_HISTORY_CAPACITY: usize = 2;

/// Committed snapshots addressed by index. Index 0 is the original and is
/// never evicted; later entries live in a deque so eviction of index 1 is a
/// `pop_front`.
pub struct HistoryManager {
    original: Option<Snapshot>,
    entries: VecDeque<Snapshot>,
    cursor: usize,
    max_history_size: usize,
    /// Running byte total of every held snapshot.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            original: None,
            entries: VecDeque::new(),
            cursor: 0,
            max_history_size: max_history_size.max(MIN_HISTORY_CAPACITY),
            total_memory: 0,
        }
    }

    /// Restart history with `original` as its only entry.
    pub fn start(&mut self, original: Snapshot) {
        self.clear();
        self.total_memory = original.memory_size();
        self.original = Some(original);
    }

    /// Append a snapshot at the cursor, discarding anything after it.
    /// Returns `false` (and does nothing) when history has not been started.
    pub fn commit(&mut self, snapshot: Snapshot) -> bool {
        if self.original.is_none() {
            return false;
        }

        // Branching from the middle drops the redo tail
        while self.entries.len() > self.cursor {
            if let Some(removed) = self.entries.pop_back() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        self.total_memory += snapshot.memory_size();
        self.entries.push_back(snapshot);
        self.prune();
        self.cursor = self.len() - 1;
        tracing::info!(cursor = self.cursor, count = self.len(), "history commit");
        true
    }

    /// Step back one entry and return it, or `None` at the start.
    pub fn back(&mut self) -> Option<Snapshot> {
        if !self.can_navigate_back() {
            return None;
        }
        self.cursor -= 1;
        self.current().cloned()
    }

    /// Step forward one entry and return it, or `None` at the end.
    pub fn forward(&mut self) -> Option<Snapshot> {
        if !self.can_navigate_forward() {
            return None;
        }
        self.cursor += 1;
        self.current().cloned()
    }

    /// Collapse to the original entry only.
    pub fn reset_to_original_only(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.total_memory = self.original.as_ref().map_or(0, |s| s.memory_size());
    }

    /// Drop everything, the original included.
    pub fn clear(&mut self) {
        self.original = None;
        self.entries.clear();
        self.cursor = 0;
        self.total_memory = 0;
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        match index {
            0 => self.original.as_ref(),
            i => self.entries.get(i - 1),
        }
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.get(self.cursor)
    }

    pub fn original(&self) -> Option<&Snapshot> {
        self.original.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        usize::from(self.original.is_some()) + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.max_history_size
    }

    pub fn can_navigate_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_navigate_forward(&self) -> bool {
        self.cursor + 1 < self.len()
    }

    /// "History: <position> / <count>", 1-based.
    pub fn status_text(&self) -> String {
        if self.is_empty() {
            return "History: 0 / 0".to_string();
        }
        format!("History: {} / {}", self.cursor + 1, self.len())
    }

    /// Bytes held by all snapshots (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Evict from index 1 until within capacity.
    fn prune(&mut self) {
        while self.len() > self.max_history_size {
            if let Some(removed) = self.entries.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::testing::solid;

    fn snap(v: u8) -> Snapshot {
        Snapshot::new(solid(2, 2, [v, v, v]))
    }

    fn started() -> HistoryManager {
        let mut h = HistoryManager::default();
        h.start(snap(0));
        h
    }

    #[test]
    fn six_commits_evict_oldest_but_keep_original() {
        let mut h = started();
        for v in 1..=6 {
            assert!(h.commit(snap(v)));
        }
        assert_eq!(h.len(), 5);
        assert_eq!(h.get(0), Some(&snap(0)));
        for (index, v) in (1..=4).zip(3..=6) {
            assert_eq!(h.get(index), Some(&snap(v)));
        }
        assert_eq!(h.cursor(), 4);
        assert_eq!(h.status_text(), "History: 5 / 5");
    }

    #[test]
    fn commit_after_back_truncates_tail() {
        let mut h = started();
        h.commit(snap(1));
        h.commit(snap(2));
        h.commit(snap(3));
        assert_eq!(h.back(), Some(snap(2)));
        assert_eq!(h.back(), Some(snap(1)));
        h.commit(snap(9));
        assert_eq!(h.len(), 3);
        assert_eq!(h.get(2), Some(&snap(9)));
        assert_eq!(h.cursor(), 2);
        assert!(!h.can_navigate_forward());
    }

    #[test]
    fn navigation_stays_in_bounds_and_never_mutates() {
        let mut h = started();
        assert_eq!(h.back(), None);
        assert_eq!(h.forward(), None);
        h.commit(snap(1));
        h.commit(snap(2));
        assert_eq!(h.back(), Some(snap(1)));
        assert_eq!(h.back(), Some(snap(0)));
        assert_eq!(h.back(), None);
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.forward(), Some(snap(1)));
        assert_eq!(h.forward(), Some(snap(2)));
        assert_eq!(h.forward(), None);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn reset_and_clear() {
        let mut h = started();
        h.commit(snap(1));
        h.commit(snap(2));
        h.reset_to_original_only();
        assert_eq!(h.len(), 1);
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.current(), Some(&snap(0)));
        assert_eq!(h.memory_usage(), 12);

        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.status_text(), "History: 0 / 0");
        assert!(!h.commit(snap(3)));
        assert_eq!(h.memory_usage(), 0);
    }

    #[test]
    fn memory_tracks_held_snapshots() {
        let mut h = started();
        for v in 1..=10 {
            h.commit(snap(v));
        }
        assert_eq!(h.memory_usage(), 12 * h.len());
        h.back();
        h.back();
        h.commit(snap(42));
        assert_eq!(h.memory_usage(), 12 * h.len());
    }

    #[test]
    fn capacity_has_a_floor() {
        let mut h = HistoryManager::new(0);
        assert_eq!(h.capacity(), MIN_HISTORY_CAPACITY);
        h.start(snap(0));
        h.commit(snap(1));
        h.commit(snap(2));
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0), Some(&snap(0)));
        assert_eq!(h.get(1), Some(&snap(2)));
    }
}
