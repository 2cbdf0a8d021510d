use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::common::FrameId;

/// Recency state shared under one lock so the ordering and the evictable
/// set can never drift apart.
struct LruState {
    /// Frames in recency order: front is most recently used, back is least.
    /// Every tracked frame appears exactly once, pinned or not, so the list
    /// stays in 1:1 correspondence with the set of resident frames.
    order: VecDeque<FrameId>,
    /// Frames that may currently be chosen as eviction victims
    evictable: HashSet<FrameId>,
}

/// Exact LRU replacement policy.
///
/// Every access moves a frame to the most-recently-used position. Eviction
/// picks the least recently used frame that is evictable; frames holding a
/// pin are skipped. Recency is a strict total order, so victim selection
/// never needs a tie-break.
pub struct LruReplacer {
    state: Mutex<LruState>,
    max_frames: usize,
}

impl LruReplacer {
    pub fn new(max_frames: usize) -> Self {
        Self {
            state: Mutex::new(LruState {
                order: VecDeque::with_capacity(max_frames),
                evictable: HashSet::new(),
            }),
            max_frames,
        }
    }

    /// Records an access: the frame becomes the most recently used. Frames
    /// not yet tracked are inserted.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        if let Some(pos) = state.order.iter().position(|&f| f == frame_id) {
            state.order.remove(pos);
        }
        state.order.push_front(frame_id);
    }

    /// Marks whether a frame may be chosen as an eviction victim. Pinned
    /// frames must be marked non-evictable by the buffer pool.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        if is_evictable {
            state.evictable.insert(frame_id);
        } else {
            state.evictable.remove(&frame_id);
        }
    }

    /// Evicts the least recently used evictable frame, removing it from the
    /// replacer. Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let pos = state
            .order
            .iter()
            .rposition(|f| state.evictable.contains(f))?;
        let victim = state.order.remove(pos)?;
        state.evictable.remove(&victim);
        Some(victim)
    }

    /// Removes a frame from the replacer entirely.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if let Some(pos) = state.order.iter().position(|&f| f == frame_id) {
            state.order.remove(pos);
        }
        state.evictable.remove(&frame_id);
    }

    /// Returns the number of evictable frames.
    pub fn evictable_count(&self) -> usize {
        self.state.lock().evictable.len()
    }

    /// Returns the number of tracked frames, evictable or not.
    pub fn tracked_count(&self) -> usize {
        self.state.lock().order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_replacer_empty() {
        let replacer = LruReplacer::new(10);
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.evictable_count(), 0);
    }

    #[test]
    fn test_lru_replacer_evicts_least_recent() {
        let replacer = LruReplacer::new(10);

        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }

        // Accessed in order 0, 1, 2: frame 0 is the least recent
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_replacer_access_refreshes_recency() {
        let replacer = LruReplacer::new(10);

        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }

        // Touch frame 0 again: frame 1 becomes the victim
        replacer.record_access(FrameId::new(0));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }

    #[test]
    fn test_lru_replacer_skips_non_evictable() {
        let replacer = LruReplacer::new(10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 0 is older but pinned
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.tracked_count(), 1);
    }

    #[test]
    fn test_lru_replacer_toggle_evictable() {
        let replacer = LruReplacer::new(10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_replacer_remove() {
        let replacer = LruReplacer::new(10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.tracked_count(), 0);
    }
}
