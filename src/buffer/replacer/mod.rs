//! Eviction policy for the buffer pool.
//!
//! The pool uses LRU-K: victims are chosen by backward k-distance, with
//! frames that have fewer than K recorded accesses (not yet trusted)
//! evicted first.

mod lru_k;

pub use lru_k::{AccessType, LruKReplacer};
