//! pagepool - the buffer-pool substrate of a teaching-grade database.
//!
//! # Architecture
//! ```text
//! caller ──► ReadPageGuard / WritePageGuard ──► FrameHeader ──► disk bytes
//!                  │                                ▲
//!                  ├── pin/unpin ─► LruKReplacer    │ (evictable set)
//!                  └── flush ─────► DiskScheduler ──┘ (FIFO, one worker)
//!                                      │
//!                                      ▼
//!                                 DiskManager
//! ```
//!
//! Three cooperating pieces form the core:
//! - [`buffer::LruKReplacer`] tracks per-frame access history and picks
//!   eviction victims by backward k-distance.
//! - [`storage::DiskScheduler`] funnels every disk operation through a
//!   single worker thread, so the [`storage::DiskManager`] (which is not
//!   thread-safe) only ever sees one caller.
//! - [`buffer::ReadPageGuard`] / [`buffer::WritePageGuard`] are scoped
//!   leases over a frame: they hold the frame's reader/writer latch for
//!   their lifetime, keep the frame pinned, and hand it back to the
//!   replacer on the last unpin.
//!
//! [`buffer::BufferPoolManager`] composes the three into a page cache
//! and is the only place guards are constructed.
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Frames, eviction policy, guards, and the pool manager
//! - [`storage`] - Disk I/O and the page format
//!
//! # Quick Start
//! ```no_run
//! use pagepool::buffer::BufferPoolManager;
//! use pagepool::storage::DiskManager;
//!
//! let dm = DiskManager::create("my_database.db").unwrap();
//! let bpm = BufferPoolManager::new(64, 2, dm);
//!
//! let mut page = bpm.new_page().unwrap();
//! page.as_mut_slice()[0] = 0xAB;
//! drop(page); // unpinned, dirty, written back on eviction or flush
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, PoolStats, ReadPageGuard, StatsSnapshot, WritePageGuard};
pub use storage::{DiskManager, DiskScheduler};
