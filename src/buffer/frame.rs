//! FrameHeader - the metadata record for one buffer pool slot.
//!
//! A [`FrameHeader`] owns a page-sized payload plus the bookkeeping the
//! pool needs: a pin count, a dirty flag, and the locks that protect
//! them. Page guards are the only supported way to touch the payload.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{
    ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

use crate::common::FrameId;
use crate::storage::Page;

/// One slot in the buffer pool.
///
/// # Locking
/// - `data`: the frame **rwlatch**. Guards hold it for their whole
///   lifetime (shared for readers, exclusive for the writer). It lives
///   inside an `Arc` so guards can keep owned lock guards.
/// - `is_dirty`: a short mutex. The flag may only go true→false under
///   this latch, and the latch is never held across I/O.
/// - `pin_count`: lock-free. `pin_count == 0` is what permits the
///   replacer to consider the frame evictable.
pub struct FrameHeader {
    /// Slot number, immutable for the life of the pool.
    frame_id: FrameId,

    /// The page payload behind the frame rwlatch.
    data: Arc<RwLock<Page>>,

    /// Whether the payload differs from disk since the last flush.
    is_dirty: Mutex<bool>,

    /// Number of outstanding guards on this frame.
    pin_count: AtomicU32,
}

impl FrameHeader {
    /// Create a new clean, unpinned frame.
    pub(crate) fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            data: Arc::new(RwLock::new(Page::new())),
            is_dirty: Mutex::new(false),
            pin_count: AtomicU32::new(0),
        }
    }

    /// This frame's slot number.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    // ========================================================================
    // Payload access (rwlatch)
    // ========================================================================

    /// Acquire the rwlatch shared, borrowing from the frame.
    #[inline]
    pub(crate) fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.data.read()
    }

    /// Acquire the rwlatch exclusive, borrowing from the frame.
    #[inline]
    pub(crate) fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.data.write()
    }

    /// Acquire the rwlatch shared as an owned guard (for page guards).
    #[inline]
    pub(crate) fn lock_shared(&self) -> ArcRwLockReadGuard<RawRwLock, Page> {
        self.data.read_arc()
    }

    /// Acquire the rwlatch exclusive as an owned guard (for page guards).
    #[inline]
    pub(crate) fn lock_exclusive(&self) -> ArcRwLockWriteGuard<RawRwLock, Page> {
        self.data.write_arc()
    }

    /// Handle to the payload for disk read requests.
    #[inline]
    pub(crate) fn page_handle(&self) -> Arc<RwLock<Page>> {
        Arc::clone(&self.data)
    }

    // ========================================================================
    // Pin count operations (Atomic)
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    /// Get the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    /// Check if the frame is currently pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty flag operations (short mutex)
    // ========================================================================

    /// Check if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        *self.is_dirty.lock()
    }

    /// Set the dirty flag.
    #[inline]
    pub(crate) fn set_dirty(&self, dirty: bool) {
        *self.is_dirty.lock() = dirty;
    }

    /// Clear the dirty flag, returning whether it was set.
    ///
    /// The latch is released before the caller does any I/O, so a
    /// concurrent writer that re-dirties the page keeps its mark.
    #[inline]
    pub(crate) fn clear_dirty(&self) -> bool {
        std::mem::replace(&mut *self.is_dirty.lock(), false)
    }

    /// Reset the frame to a clean, zeroed state for reuse.
    ///
    /// Only valid while the frame is unpinned and unmapped.
    pub(crate) fn reset(&self) {
        self.page_mut().reset();
        self.set_dirty(false);
        self.pin_count.store(0, Ordering::Relaxed);
    }
}
