//! Disk Scheduler - serialises page I/O through one worker thread.
//!
//! Callers hand the scheduler [`DiskRequest`]s and get back immediately;
//! a single background worker drains the queue in FIFO order and is the
//! only thread that ever touches the [`DiskManager`] (which is not
//! thread-safe). Each request carries a one-shot completion channel the
//! caller can block on.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::RwLock;

use crate::common::PageId;
use crate::storage::disk_manager::DiskManager;
use crate::storage::page::Page;

/// The payload of a disk request.
///
/// Writes carry an owned snapshot of the page: the caller may still be
/// holding the frame's rwlatch while it waits for the completion, so the
/// worker must not need that lock. Reads carry the destination buffer,
/// which the worker write-locks; a page being loaded has no outstanding
/// guards, so the lock is uncontended.
pub enum DiskData {
    /// Owned copy of the page to persist.
    Write(Box<Page>),
    /// Shared buffer the worker fills from disk.
    Read(Arc<RwLock<Page>>),
}

/// A single I/O intent queued for the worker.
pub struct DiskRequest {
    /// The page on disk being read or written.
    pub page_id: PageId,
    /// Direction plus buffer.
    pub data: DiskData,
    /// One-shot completion signal: `true` on success, `false` on failure.
    pub done: Sender<bool>,
}

/// FIFO multiplexer giving the disk a single-writer view.
///
/// # Ordering
/// Requests complete in submission order. There is no reordering, no
/// coalescing, and no retry; a failed disk operation surfaces as `false`
/// through the request's completion channel.
///
/// # Shutdown
/// Dropping the scheduler enqueues a sentinel and joins the worker, so
/// every previously scheduled request completes first. Scheduling a
/// request concurrently with the drop is a caller error.
///
/// # Example
/// ```no_run
/// use pagepool::storage::{DiskData, DiskManager, DiskRequest, DiskScheduler};
/// use pagepool::{PageId, storage::Page};
///
/// let dm = DiskManager::create("scratch.db").unwrap();
/// let scheduler = DiskScheduler::new(dm);
///
/// let (done, wait) = DiskScheduler::create_promise();
/// scheduler.schedule(DiskRequest {
///     page_id: PageId::new(0),
///     data: DiskData::Write(Page::new().boxed_copy()),
///     done,
/// });
/// assert!(wait.recv().unwrap());
/// ```
pub struct DiskScheduler {
    /// Request queue; `None` is the shutdown sentinel.
    queue: Sender<Option<DiskRequest>>,
    /// The background worker, joined on drop.
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Create a scheduler and spawn its worker.
    ///
    /// The worker takes ownership of the disk manager; nothing else can
    /// reach the disk afterwards.
    pub fn new(disk_manager: DiskManager) -> Self {
        let (tx, rx) = mpsc::channel();

        let worker = thread::spawn(move || Self::worker_loop(rx, disk_manager));

        Self {
            queue: tx,
            worker: Some(worker),
        }
    }

    /// Enqueue a request. Returns immediately.
    ///
    /// # Panics
    /// Panics if the worker has already been shut down; scheduling during
    /// teardown is a programming error.
    pub fn schedule(&self, request: DiskRequest) {
        self.queue
            .send(Some(request))
            .expect("disk scheduler worker terminated");
    }

    /// Create a one-shot completion channel for a request.
    ///
    /// The sender goes into the [`DiskRequest`]; the caller keeps the
    /// receiver and blocks on it when it needs the result.
    pub fn create_promise() -> (Sender<bool>, Receiver<bool>) {
        mpsc::channel()
    }

    /// Drains the queue until the sentinel, dispatching each request.
    fn worker_loop(queue: Receiver<Option<DiskRequest>>, mut disk: DiskManager) {
        debug!("disk scheduler worker started");

        while let Ok(Some(request)) = queue.recv() {
            let page_id = request.page_id;
            let ok = match request.data {
                DiskData::Write(page) => match disk.write_page(page_id, &page) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("write of {page_id} failed: {e}");
                        false
                    }
                },
                DiskData::Read(buffer) => {
                    let mut buffer = buffer.write();
                    match disk.read_page(page_id, &mut buffer) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("read of {page_id} failed: {e}");
                            false
                        }
                    }
                }
            };

            // The caller may have given up waiting; a lost signal is fine.
            let _ = request.done.send(ok);
        }

        debug!("disk scheduler worker exiting");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Sentinel, then join: everything queued before this point still
        // reaches the disk.
        let _ = self.queue.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
