//! The buffer manager contract consumed by the B+-tree index.
//!
//! Mirrors the abstract contract in the index's design: `alloc_page`,
//! `read_page`, `unpin_page`, `flush_file`, expressed in the idiomatic
//! Rust shape of a trait plus an RAII guard rather than explicit pin/unpin
//! calls. A page stays pinned for exactly as long as its `PageGuard` is
//! alive; any mutable access marks the frame dirty, so callers never pass
//! a `dirty` flag by hand.

use std::ops::{Deref, DerefMut};

pub use paged_file::{PageId, PageBuf, INVALID_PAGE, PAGE_SIZE};

/// Errors surfaced by the buffer pool manager.
#[derive(Debug)]
pub enum BpmError {
    /// The pool is full and no frame could be evicted (none are unpinned).
    NoFreeFrames,
    /// An I/O failure from the underlying paged file.
    Io(std::io::Error),
}

impl From<std::io::Error> for BpmError {
    fn from(err: std::io::Error) -> Self {
        BpmError::Io(err)
    }
}

impl std::fmt::Display for BpmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BpmError::NoFreeFrames => write!(f, "buffer pool has no free frames to evict"),
            BpmError::Io(err) => write!(f, "buffer pool I/O error: {err}"),
        }
    }
}

impl std::error::Error for BpmError {}

/// A pinned page. Dereferencing mutably marks the page dirty; dropping the
/// guard unpins it, flushing to the backing frame (not necessarily disk).
pub trait PageGuard: Deref<Target = [u8]> + DerefMut {
    /// The id of the page this guard holds pinned.
    fn page_id(&self) -> PageId;
}

/// The buffer manager's public contract: allocate, read, unpin, flush.
///
/// Implementations must be single-threaded-safe only; concurrent access is
/// out of scope for this index (see the index's concurrency model).
pub trait BufferPoolManager {
    /// Reads `page_id`, pinning it. Reads from the backing file if not resident.
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BpmError>;

    /// Allocates a fresh page, pinned and zeroed.
    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BpmError>;

    /// Explicit unpin escape hatch. Real unpinning happens when the
    /// `PageGuard` drops; this exists only for trait symmetry with the
    /// abstract contract and is a no-op in the provided implementation.
    fn unpin_page(&self, page_id: PageId) -> Result<(), BpmError>;

    /// Flushes a single page to stable storage if dirty.
    fn flush_page(&self, page_id: PageId) -> Result<(), BpmError>;

    /// Flushes every dirty page to stable storage.
    fn flush_all_pages(&self) -> Result<(), BpmError>;
}
