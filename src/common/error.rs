//! Error types for pagepool.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors surfaced by the buffer pool.
///
/// Programming errors (using a guard after releasing it, pin-count
/// underflow, scheduling on a scheduler that is shutting down) are not
/// represented here; they panic instead.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from file operations inside the disk manager.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame id outside the pool was handed to the replacer.
    #[error("frame id {frame_id} out of range (pool holds {num_frames} frames)")]
    FrameOutOfRange { frame_id: usize, num_frames: usize },

    /// Tried to remove a frame the replacer is not allowed to give up.
    #[error("frame {0} is not evictable")]
    FrameNotEvictable(usize),

    /// Requested page id was never allocated.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// The disk worker reported failure while loading a page.
    #[error("reading page {0} from disk failed")]
    PageReadFailed(u32),

    /// The disk worker reported failure while writing a page back.
    #[error("write-back of page {0} failed")]
    WriteBackFailed(u32),

    /// Every frame is pinned and nothing can be evicted.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// Attempted to delete a page that still has outstanding guards.
    #[error("page {0} is still pinned")]
    PagePinned(u32),
}
