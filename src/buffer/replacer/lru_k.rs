//! LRU-K replacement policy.
//!
//! LRU-K evicts the frame whose backward k-distance is largest, where
//! the backward k-distance is the difference between the current time
//! and the time of the k-th most recent access. A frame with fewer than
//! k recorded accesses has +inf distance; when several frames are at
//! +inf, classical LRU (oldest recorded access) picks among them.
//!
//! Compared to plain LRU this dampens single-access noise: one scan
//! touching a page once does not promote it above a working-set page
//! that has been touched many times.

use std::collections::{HashMap, VecDeque};

use crate::common::{Error, FrameId, Result};

/// How a frame was accessed.
///
/// Carried through [`LruKReplacer::record_access`] but not yet consulted
/// by the policy; reserved for scan-resistant variants that treat
/// sequential scans differently from point lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    #[default]
    Unknown,
    Lookup,
    Scan,
    Index,
}

/// Per-frame access history.
struct LruKNode {
    /// Logical timestamps of the most recent accesses, oldest first.
    /// Holds at most `k` entries; never empty once the node exists.
    history: VecDeque<u64>,

    /// Whether the replacer may choose this frame as a victim.
    evictable: bool,
}

impl LruKNode {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            evictable: false,
        }
    }

    /// Record an access, keeping only the `k` most recent stamps.
    fn push_stamp(&mut self, stamp: u64, k: usize) {
        if self.history.len() == k {
            self.history.pop_front();
        }
        self.history.push_back(stamp);
    }

    /// Oldest retained stamp. For an under-sampled node this is the
    /// first access ever seen; for a fully-sampled node it is the k-th
    /// most recent access, i.e. the backward k-distance anchor.
    fn oldest_stamp(&self) -> u64 {
        self.history.front().copied().unwrap_or(0)
    }
}

/// Selects eviction victims among the currently evictable frames.
///
/// The replacer is shared behind a mutex; every operation expects the
/// caller to hold that mutex for the duration of the call, which is
/// always short bookkeeping and never I/O.
///
/// # Victim order
/// 1. Under-sampled frames (fewer than k recorded accesses) before
///    fully-sampled ones.
/// 2. Within the under-sampled class, the oldest first access wins;
///    within the fully-sampled class, the largest backward k-distance
///    wins (equivalently, the smallest k-th most recent stamp).
/// 3. Remaining ties go to the smaller frame id. With the logical clock
///    stamps are unique, so this leg only exists to keep the scan
///    deterministic.
///
/// # Example
/// ```
/// use pagepool::buffer::{AccessType, LruKReplacer};
/// use pagepool::FrameId;
///
/// let mut replacer = LruKReplacer::new(4, 2);
/// replacer.record_access(FrameId::new(0), AccessType::Unknown).unwrap();
/// replacer.set_evictable(FrameId::new(0), true);
/// assert_eq!(replacer.evict(), Some(FrameId::new(0)));
/// ```
pub struct LruKReplacer {
    /// Access history per known frame.
    node_store: HashMap<FrameId, LruKNode>,

    /// Logical clock; strictly increases with every recorded access.
    current_timestamp: u64,

    /// Number of evictable frames.
    curr_size: usize,

    /// Capacity of the pool being tracked; frame ids must be below this.
    num_frames: usize,

    /// How many accesses the policy remembers per frame.
    k: usize,
}

impl LruKReplacer {
    /// Create a replacer for a pool of `num_frames` slots.
    ///
    /// # Panics
    /// Panics if `k` is 0.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "k must be at least 1");
        Self {
            node_store: HashMap::new(),
            current_timestamp: 0,
            curr_size: 0,
            num_frames,
            k,
        }
    }

    /// Record that `frame_id` was accessed now.
    ///
    /// Creates the node (non-evictable) on first touch. The access type
    /// is accepted but does not affect the policy.
    ///
    /// # Errors
    /// `Error::FrameOutOfRange` when `frame_id` does not name a slot of
    /// this pool.
    pub fn record_access(&mut self, frame_id: FrameId, _access_type: AccessType) -> Result<()> {
        if frame_id.0 >= self.num_frames {
            return Err(Error::FrameOutOfRange {
                frame_id: frame_id.0,
                num_frames: self.num_frames,
            });
        }

        self.current_timestamp += 1;
        let stamp = self.current_timestamp;

        self.node_store
            .entry(frame_id)
            .or_insert_with(LruKNode::new)
            .push_stamp(stamp, self.k);

        Ok(())
    }

    /// Toggle whether `frame_id` may be chosen as a victim.
    ///
    /// Unknown frames and no-op transitions are ignored.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let Some(node) = self.node_store.get_mut(&frame_id) else {
            return;
        };
        if node.evictable == evictable {
            return;
        }

        node.evictable = evictable;
        if evictable {
            self.curr_size += 1;
        } else {
            self.curr_size -= 1;
        }
    }

    /// Forget `frame_id` and its history, regardless of its k-distance.
    ///
    /// # Errors
    /// `Error::FrameNotEvictable` when the frame is known but currently
    /// pinned; removing it would lose a frame the pool still uses.
    /// Unknown frames return `Ok` silently.
    pub fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        match self.node_store.get(&frame_id) {
            None => Ok(()),
            Some(node) if !node.evictable => Err(Error::FrameNotEvictable(frame_id.0)),
            Some(_) => {
                self.node_store.remove(&frame_id);
                self.curr_size -= 1;
                Ok(())
            }
        }
    }

    /// Choose, erase, and return the eviction victim.
    ///
    /// Returns `None` when no frame is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        if self.curr_size == 0 {
            return None;
        }

        // Minimising (fully_sampled, oldest_stamp, frame_id) implements
        // the victim order: under-sampled first, then oldest first
        // access / largest k-distance, then smaller frame id.
        let mut victim: Option<(bool, u64, FrameId)> = None;
        for (&frame_id, node) in &self.node_store {
            if !node.evictable {
                continue;
            }
            let key = (
                node.history.len() >= self.k,
                node.oldest_stamp(),
                frame_id,
            );
            if victim.map_or(true, |best| key < best) {
                victim = Some(key);
            }
        }

        let (_, _, frame_id) = victim?;
        self.node_store.remove(&frame_id);
        self.curr_size -= 1;
        Some(frame_id)
    }

    /// Number of currently evictable frames.
    pub fn size(&self) -> usize {
        self.curr_size
    }
}
