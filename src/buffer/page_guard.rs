//! RAII guards for page access.
//!
//! These guards are the only supported way to touch frame bytes:
//! - [`ReadPageGuard`] - shared access (multiple readers allowed)
//! - [`WritePageGuard`] - exclusive access (re-marks the page dirty on drop)
//!
//! A guard owns the frame's rwlatch for its whole lifetime and one unit
//! of the frame's pin count. Releasing the guard (explicitly via
//! [`drop_guard`](ReadPageGuard::drop_guard) or implicitly on drop)
//! unlatches, unpins, and - on the last unpin - hands the frame back to
//! the replacer as evictable.
//!
//! Only the buffer pool manager constructs guards: it has already placed
//! the page into the frame and pinned it by the time a constructor runs.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock};

use crate::buffer::frame::FrameHeader;
use crate::buffer::replacer::{AccessType, LruKReplacer};
use crate::common::{Error, PageId, Result};
use crate::storage::{DiskData, DiskRequest, DiskScheduler, Page};

/// Write the frame's current contents through the scheduler if dirty.
///
/// The dirty flag is cleared under the frame's short latch *before* the
/// write is submitted: a concurrent write guard that re-dirties the page
/// during the flush keeps its mark, and a concurrent read guard cannot
/// mutate. The flip side is that a failed write leaves the flag cleared;
/// the error tells the caller, who decides what to do about it.
fn flush_frame(
    frame: &FrameHeader,
    page_id: PageId,
    page: &Page,
    scheduler: &DiskScheduler,
) -> Result<()> {
    if !frame.clear_dirty() {
        return Ok(()); // clean, nothing to write
    }

    let (done, wait) = DiskScheduler::create_promise();
    scheduler.schedule(DiskRequest {
        page_id,
        // Owned snapshot: the caller still holds the frame rwlatch while
        // blocking below, so the worker must not need it.
        data: DiskData::Write(page.boxed_copy()),
        done,
    });

    match wait.recv() {
        Ok(true) => Ok(()),
        _ => Err(Error::WriteBackFailed(page_id.0)),
    }
}

/// Guard for read-only page access.
///
/// Multiple `ReadPageGuard`s can exist for the same page simultaneously.
/// Guards are movable and non-copyable; a moved-from guard is statically
/// unusable, so the latch is released exactly once.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let first = guard.as_slice()[0]; // Deref to &Page
/// // guard drops here: latch released, page unpinned
/// ```
pub struct ReadPageGuard {
    /// The page this guard is protecting.
    page_id: PageId,
    /// The frame holding that page.
    frame: Arc<FrameHeader>,
    /// For the evictable hand-off on the last unpin.
    replacer: Arc<Mutex<LruKReplacer>>,
    /// Serialises that hand-off against the pool's pin path.
    pool_latch: Arc<Mutex<()>>,
    /// For flushing through the single I/O worker.
    scheduler: Arc<DiskScheduler>,
    /// The held rwlatch; `None` once the guard has been released.
    data: Option<ArcRwLockReadGuard<RawRwLock, Page>>,
}

impl ReadPageGuard {
    /// Create a valid read guard. Blocks until the frame's rwlatch can
    /// be acquired in shared mode.
    ///
    /// The caller (the buffer pool manager) must have pinned the frame.
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        replacer: Arc<Mutex<LruKReplacer>>,
        pool_latch: Arc<Mutex<()>>,
        scheduler: Arc<DiskScheduler>,
    ) -> Self {
        let data = frame.lock_shared();

        replacer
            .lock()
            .record_access(frame.frame_id(), AccessType::Unknown)
            .expect("pool frame ids are always within replacer bounds");

        Self {
            page_id,
            frame,
            replacer,
            pool_latch,
            scheduler,
            data: Some(data),
        }
    }

    /// The page ID of the page this guard is protecting.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Whether the page has been modified since it was last flushed.
    pub fn is_dirty(&self) -> bool {
        self.frame.is_dirty()
    }

    /// Flush this page to disk, blocking until the write completes.
    ///
    /// Idempotent on a clean page.
    pub fn flush(&self) -> Result<()> {
        let page = self.data.as_deref().expect("page guard used after release");
        flush_frame(&self.frame, self.page_id, page, &self.scheduler)
    }

    /// Release this guard early. Safe to call more than once.
    ///
    /// Release order matters: unlatch first, then unpin, and only on the
    /// 1→0 edge take the pool latch and re-check the pin count before
    /// telling the replacer - a racing fetch may have re-pinned the
    /// frame between the unpin and the latch acquisition.
    pub fn drop_guard(&mut self) {
        let Some(data) = self.data.take() else {
            return; // already released
        };
        drop(data);

        if self.frame.unpin() == 0 {
            let _pool = self.pool_latch.lock();
            if self.frame.pin_count() == 0 {
                self.replacer
                    .lock()
                    .set_evictable(self.frame.frame_id(), true);
            }
        }
    }
}

impl Deref for ReadPageGuard {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.data.as_deref().expect("page guard used after release")
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `WritePageGuard` can exist for a page at a time, and no read
/// guards can coexist with it. Dropping the guard re-marks the page
/// dirty: every successful mutation becomes observable to subsequent
/// holders and will reach disk on the next flush or eviction.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF; // DerefMut to &mut Page
/// // guard drops here: marked dirty, latch released, unpinned
/// ```
pub struct WritePageGuard {
    /// The page this guard is protecting.
    page_id: PageId,
    /// The frame holding that page.
    frame: Arc<FrameHeader>,
    /// For the evictable hand-off on the last unpin.
    replacer: Arc<Mutex<LruKReplacer>>,
    /// Serialises that hand-off against the pool's pin path.
    pool_latch: Arc<Mutex<()>>,
    /// For flushing through the single I/O worker.
    scheduler: Arc<DiskScheduler>,
    /// The held rwlatch; `None` once the guard has been released.
    data: Option<ArcRwLockWriteGuard<RawRwLock, Page>>,
}

impl WritePageGuard {
    /// Create a valid write guard. Blocks until the frame's rwlatch can
    /// be acquired exclusively.
    ///
    /// The caller (the buffer pool manager) must have pinned the frame.
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        replacer: Arc<Mutex<LruKReplacer>>,
        pool_latch: Arc<Mutex<()>>,
        scheduler: Arc<DiskScheduler>,
    ) -> Self {
        let data = frame.lock_exclusive();

        replacer
            .lock()
            .record_access(frame.frame_id(), AccessType::Unknown)
            .expect("pool frame ids are always within replacer bounds");

        Self {
            page_id,
            frame,
            replacer,
            pool_latch,
            scheduler,
            data: Some(data),
        }
    }

    /// The page ID of the page this guard is protecting.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Whether the page has been modified since it was last flushed.
    pub fn is_dirty(&self) -> bool {
        self.frame.is_dirty()
    }

    /// Flush this page to disk, blocking until the write completes.
    ///
    /// Idempotent on a clean page. Note that dropping the guard after a
    /// flush re-marks the page dirty.
    pub fn flush(&self) -> Result<()> {
        let page = self.data.as_deref().expect("page guard used after release");
        flush_frame(&self.frame, self.page_id, page, &self.scheduler)
    }

    /// Release this guard early. Safe to call more than once.
    ///
    /// In order: mark the frame dirty under its short latch, release the
    /// rwlatch, unpin, and on the 1→0 edge take the pool latch, re-check
    /// the pin count, and hand the frame to the replacer.
    pub fn drop_guard(&mut self) {
        let Some(data) = self.data.take() else {
            return; // already released
        };

        // This guard had exclusive access; assume it wrote.
        self.frame.set_dirty(true);
        drop(data);

        if self.frame.unpin() == 0 {
            let _pool = self.pool_latch.lock();
            if self.frame.pin_count() == 0 {
                self.replacer
                    .lock()
                    .set_evictable(self.frame.frame_id(), true);
            }
        }
    }
}

impl Deref for WritePageGuard {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.data.as_deref().expect("page guard used after release")
    }
}

impl DerefMut for WritePageGuard {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.data
            .as_deref_mut()
            .expect("page guard used after release")
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.drop_guard();
    }
}
