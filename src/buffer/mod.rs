//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between storage engines
//! and disk. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The main page cache
//! - [`FrameHeader`] - A slot in the buffer pool holding a page + metadata
//! - [`ReadPageGuard`] / [`WritePageGuard`] - RAII guards for page access
//! - [`LruKReplacer`] - LRU-K eviction policy
//! - [`PoolStats`] - Performance statistics

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::FrameHeader;
pub use page_guard::{ReadPageGuard, WritePageGuard};
pub use replacer::{AccessType, LruKReplacer};
pub use stats::{PoolStats, StatsSnapshot};
