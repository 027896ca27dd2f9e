//! Buffer Pool Manager - composes the replacer, scheduler, and guards
//! into a page cache.
//!
//! The [`BufferPoolManager`] owns the page table and free list, decides
//! which frame a page lives in, and is the only authorised constructor
//! of page guards: by the time a guard exists, its frame is mapped and
//! pinned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::frame::FrameHeader;
use crate::buffer::page_guard::{ReadPageGuard, WritePageGuard};
use crate::buffer::replacer::LruKReplacer;
use crate::buffer::stats::PoolStats;
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::{DiskData, DiskManager, DiskRequest, DiskScheduler};

/// Bidirectional page↔frame mapping.
///
/// The frame headers themselves do not know which page they hold; this
/// table is the single source of truth for residency.
struct PageTable {
    /// PageId → FrameId for fetches.
    forward: HashMap<PageId, FrameId>,
    /// FrameId → PageId for eviction write-backs, indexed by slot.
    backward: Vec<Option<PageId>>,
}

impl PageTable {
    fn new(num_frames: usize) -> Self {
        Self {
            forward: HashMap::with_capacity(num_frames),
            backward: vec![None; num_frames],
        }
    }

    fn get(&self, page_id: PageId) -> Option<FrameId> {
        self.forward.get(&page_id).copied()
    }

    fn insert(&mut self, page_id: PageId, frame_id: FrameId) {
        self.forward.insert(page_id, frame_id);
        self.backward[frame_id.0] = Some(page_id);
    }

    fn remove_page(&mut self, page_id: PageId) -> Option<FrameId> {
        let frame_id = self.forward.remove(&page_id)?;
        self.backward[frame_id.0] = None;
        Some(frame_id)
    }

    fn remove_frame(&mut self, frame_id: FrameId) -> Option<PageId> {
        let page_id = self.backward[frame_id.0].take()?;
        self.forward.remove(&page_id);
        Some(page_id)
    }

    fn pages(&self) -> Vec<PageId> {
        self.forward.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.forward.len()
    }
}

/// Manages a fixed pool of frames caching disk pages.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                     BufferPoolManager                        │
/// │  ┌──────────────┐  ┌────────────────────────────────────┐   │
/// │  │ page_table   │  │   frames: Vec<Arc<FrameHeader>>    │   │
/// │  │ PageId ↔ Fid │─▶│  [Frame0] [Frame1] [Frame2] ...    │   │
/// │  └──────────────┘  └────────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐     │
/// │  │  free_list   │  │ LruKReplacer │  │ DiskScheduler  │     │
/// │  │ Vec<FrameId> │  │  (shared)    │  │ (one worker)   │     │
/// │  └──────────────┘  └──────────────┘  └────────────────┘     │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Locking
/// - The **pool latch** serialises page-table transitions and the
///   evictability hand-off; guards share it and take it only on the
///   last-unpin edge. It is never held while a frame rwlatch is held.
/// - `page_table` and `free_list` sit behind their own leaf mutexes.
/// - The replacer mutex is a leaf, held only for bookkeeping.
/// - Guards are constructed after the pool latch is released, so the
///   (possibly blocking) rwlatch acquisition happens without it.
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.db")?;
/// let bpm = BufferPoolManager::new(10, 2, dm);
///
/// let mut guard = bpm.new_page()?;
/// guard.as_mut_slice()[0] = 0xAB;
/// drop(guard); // marked dirty, unpinned
///
/// let guard = bpm.fetch_page_read(PageId::new(0))?;
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Arc<FrameHeader>>,

    /// Serialises residency and evictability decisions; shared with guards.
    latch: Arc<Mutex<()>>,

    /// Which page lives in which frame.
    page_table: Mutex<PageTable>,

    /// Frames holding no page (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy, shared with guards for the unpin hand-off.
    replacer: Arc<Mutex<LruKReplacer>>,

    /// Single-worker I/O multiplexer, shared with guards for flushes.
    scheduler: Arc<DiskScheduler>,

    /// Next page id to hand out; ids are never reused.
    next_page_id: AtomicU32,

    /// Performance counters.
    stats: PoolStats,

    /// Number of frames in the pool (immutable after construction).
    num_frames: usize,
}

impl BufferPoolManager {
    /// Create a buffer pool of `num_frames` slots with an LRU-K replacer
    /// remembering `k` accesses per frame.
    ///
    /// The disk manager moves into the scheduler's worker thread; all
    /// disk traffic goes through the scheduler from here on.
    ///
    /// # Panics
    /// Panics if `num_frames` is 0 or `k` is 0.
    pub fn new(num_frames: usize, k: usize, disk_manager: DiskManager) -> Self {
        assert!(num_frames > 0, "num_frames must be > 0");

        // Page ids resume after whatever the file already holds.
        let next_page_id = disk_manager.page_count();

        let frames = (0..num_frames)
            .map(|i| Arc::new(FrameHeader::new(FrameId::new(i))))
            .collect();
        let free_list: Vec<FrameId> = (0..num_frames).map(FrameId::new).collect();

        Self {
            frames,
            latch: Arc::new(Mutex::new(())),
            page_table: Mutex::new(PageTable::new(num_frames)),
            free_list: Mutex::new(free_list),
            replacer: Arc::new(Mutex::new(LruKReplacer::new(num_frames, k))),
            scheduler: Arc::new(DiskScheduler::new(disk_manager)),
            next_page_id: AtomicU32::new(next_page_id),
            stats: PoolStats::new(),
            num_frames,
        }
    }

    // ========================================================================
    // Public API: Page allocation
    // ========================================================================

    /// Hand out a fresh page id. Ids are never reused.
    pub fn allocate_page_id(&self) -> PageId {
        PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate a new page and return a write guard for it.
    ///
    /// The frame starts dirty so the first write-back materialises the
    /// page on disk; no I/O happens on this path unless a frame has to
    /// be evicted.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - `Error::WriteBackFailed` if evicting a dirty victim fails
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let page_id = self.allocate_page_id();

        let frame = {
            let _pool = self.latch.lock();
            let frame_id = self.acquire_frame()?;
            let frame = &self.frames[frame_id.0];

            frame.set_dirty(true);
            frame.pin();
            self.page_table.lock().insert(page_id, frame_id);
            Arc::clone(frame)
        };

        Ok(WritePageGuard::new(
            page_id,
            frame,
            Arc::clone(&self.replacer),
            Arc::clone(&self.latch),
            Arc::clone(&self.scheduler),
        ))
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// Blocks while a writer holds the page.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page id was never allocated
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - `Error::PageReadFailed` if the disk read fails
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.pin_frame(page_id)?;
        Ok(ReadPageGuard::new(
            page_id,
            frame,
            Arc::clone(&self.replacer),
            Arc::clone(&self.latch),
            Arc::clone(&self.scheduler),
        ))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// Blocks while any other guard holds the page.
    ///
    /// # Errors
    /// Same as [`fetch_page_read`](Self::fetch_page_read).
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.pin_frame(page_id)?;
        Ok(WritePageGuard::new(
            page_id,
            frame,
            Arc::clone(&self.replacer),
            Arc::clone(&self.latch),
            Arc::clone(&self.scheduler),
        ))
    }

    /// Like [`fetch_page_read`](Self::fetch_page_read), but `None`
    /// instead of an error.
    pub fn checked_read_page(&self, page_id: PageId) -> Option<ReadPageGuard> {
        self.fetch_page_read(page_id).ok()
    }

    /// Like [`fetch_page_write`](Self::fetch_page_write), but `None`
    /// instead of an error.
    pub fn checked_write_page(&self, page_id: PageId) -> Option<WritePageGuard> {
        self.fetch_page_write(page_id).ok()
    }

    // ========================================================================
    // Public API: Flush and delete
    // ========================================================================

    /// Flush a page to disk if it is resident and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        if !self.contains_page(page_id) {
            return Ok(()); // not resident, nothing to flush
        }
        let guard = self.fetch_page_read(page_id)?;
        guard.flush()
    }

    /// Flush every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages = self.page_table.lock().pages();
        for page_id in pages {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drop a page from the buffer pool.
    ///
    /// The on-disk bytes are not reclaimed. Deleting a page that is not
    /// resident is a no-op.
    ///
    /// # Errors
    /// `Error::PagePinned` if guards are still outstanding.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let _pool = self.latch.lock();

        let Some(frame_id) = self.page_table.lock().get(page_id) else {
            return Ok(());
        };

        let frame = &self.frames[frame_id.0];
        if frame.is_pinned() {
            return Err(Error::PagePinned(page_id.0));
        }

        self.page_table.lock().remove_page(page_id);
        self.replacer.lock().remove(frame_id)?;
        frame.reset();
        self.free_list.lock().push(frame_id);

        Ok(())
    }

    // ========================================================================
    // Public API: Observers
    // ========================================================================

    /// Pin count of a resident page; `None` when the page is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let _pool = self.latch.lock();
        let frame_id = self.page_table.lock().get(page_id)?;
        Some(self.frames[frame_id.0].pin_count())
    }

    /// Whether the page is currently resident.
    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.page_table.lock().get(page_id).is_some()
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.num_frames
    }

    /// Number of frames holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of resident pages.
    pub fn resident_page_count(&self) -> usize {
        self.page_table.lock().len()
    }

    /// Performance counters.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    // ========================================================================
    // Internal: residency
    // ========================================================================

    /// Make `page_id` resident and pinned, returning its frame.
    ///
    /// The whole transition happens under the pool latch; the returned
    /// frame is pinned, so it cannot be evicted between this call and
    /// guard construction.
    fn pin_frame(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if page_id.0 >= self.next_page_id.load(Ordering::Relaxed) {
            return Err(Error::PageNotFound(page_id.0));
        }

        let _pool = self.latch.lock();

        // Fast path: already resident.
        if let Some(frame_id) = self.page_table.lock().get(page_id) {
            let frame = &self.frames[frame_id.0];
            frame.pin();
            self.replacer.lock().set_evictable(frame_id, false);
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(frame));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame()?;
        let frame = &self.frames[frame_id.0];

        // Load through the scheduler. The worker takes the frame's write
        // latch, which is uncontended: the frame is unmapped and unpinned.
        let (done, wait) = DiskScheduler::create_promise();
        self.scheduler.schedule(DiskRequest {
            page_id,
            data: DiskData::Read(frame.page_handle()),
            done,
        });
        if !wait.recv().unwrap_or(false) {
            self.free_list.lock().push(frame_id);
            return Err(Error::PageReadFailed(page_id.0));
        }

        frame.pin();
        self.page_table.lock().insert(page_id, frame_id);
        Ok(Arc::clone(frame))
    }

    /// Claim an empty frame, evicting a victim if the free list is dry.
    ///
    /// Caller holds the pool latch. Frames on the free list are always
    /// clean and zeroed.
    fn acquire_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        let frame_id = {
            let mut replacer = self.replacer.lock();
            replacer.evict().ok_or(Error::NoFreeFrames)?
        };
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        let evicted = self.page_table.lock().remove_frame(frame_id);
        debug!("evicting {frame_id} (page {evicted:?})");

        if frame.clear_dirty() {
            if let Some(page_id) = evicted {
                let snapshot = frame.page().boxed_copy();
                let (done, wait) = DiskScheduler::create_promise();
                self.scheduler.schedule(DiskRequest {
                    page_id,
                    data: DiskData::Write(snapshot),
                    done,
                });
                if !wait.recv().unwrap_or(false) {
                    frame.reset();
                    self.free_list.lock().push(frame_id);
                    return Err(Error::WriteBackFailed(page_id.0));
                }
                self.stats.writebacks.fetch_add(1, Ordering::Relaxed);
            }
        }

        frame.reset();
        Ok(frame_id)
    }
}
