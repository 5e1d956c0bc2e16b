//! Fixed-size page I/O against a single backing file.
//!
//! This is the paged-file abstraction the B+-tree index treats as an
//! external collaborator: page identifiers, a fixed page byte array, and
//! an invalid-page sentinel. It does no buffering or pinning of its own;
//! that is `buffer_pool`'s job.

use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;
use tracing::debug;

/// A dense, positive page identifier. `INVALID_PAGE` (`0`) is reserved.
pub type PageId = usize;

/// The reserved sentinel identifying "no page". Never a valid allocated page.
pub const INVALID_PAGE: PageId = 0;

/// Size in bytes of a single page. Every node type is laid out to fit exactly.
pub const PAGE_SIZE: usize = 4096;

/// One page's worth of bytes.
pub type PageBuf = [u8; PAGE_SIZE];

/// Manages positioned reads and writes of fixed-size pages to a single file,
/// plus a monotonic page-id allocator.
///
/// Page 0 is never written; callers that need a metadata page use page 1
/// by convention (see `btree_index`).
pub struct PagedFile {
    file: File,
    next_page_id: Cell<PageId>,
}

impl PagedFile {
    /// Opens an existing paged file. Fails with `NotFound` if `path` does not exist,
    /// which callers use to distinguish "reopen" from "create fresh".
    pub fn open_existing(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "paged file does not exist"));
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let next_page_id = (len as usize / PAGE_SIZE).max(1);
        debug!(path = %path.display(), next_page_id, "opened existing paged file");
        Ok(Self { file, next_page_id: Cell::new(next_page_id) })
    }

    /// Creates a fresh, empty paged file, truncating anything already there.
    pub fn create_new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file, next_page_id: Cell::new(1) })
    }

    /// Reads the page at `page_id` into a freshly allocated buffer.
    pub fn read_page(&self, page_id: PageId) -> io::Result<PageBuf> {
        debug_assert_ne!(page_id, INVALID_PAGE, "attempted to read the invalid page");
        let mut buf = [0u8; PAGE_SIZE];
        let offset = (page_id * PAGE_SIZE) as u64;
        self.file.read_exact_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Writes `data` to the page at `page_id`.
    pub fn write_page(&self, page_id: PageId, data: &PageBuf) -> io::Result<()> {
        debug_assert_ne!(page_id, INVALID_PAGE, "attempted to write the invalid page");
        let offset = (page_id * PAGE_SIZE) as u64;
        self.file.write_all_at(data, offset)
    }

    /// Reserves the next page id. Does not write anything; callers must
    /// `write_page` the initialized image before the id is durable.
    pub fn allocate_page_id(&self) -> PageId {
        let id = self.next_page_id.get();
        self.next_page_id.set(id + 1);
        id
    }

    /// Forces all written data to stable storage.
    pub fn flush(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn fresh_file_allocates_from_page_one() {
        let tmp = NamedTempFile::new().unwrap();
        let pf = PagedFile::create_new(tmp.path()).unwrap();
        assert_eq!(pf.allocate_page_id(), 1);
        assert_eq!(pf.allocate_page_id(), 2);
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = NamedTempFile::new().unwrap();
        let pf = PagedFile::create_new(tmp.path()).unwrap();
        let id = pf.allocate_page_id();
        let mut buf = [0u8; PAGE_SIZE];
        buf[0] = 0xAB;
        buf[PAGE_SIZE - 1] = 0xCD;
        pf.write_page(id, &buf).unwrap();
        let read_back = pf.read_page(id).unwrap();
        assert_eq!(read_back[0], 0xAB);
        assert_eq!(read_back[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn open_existing_rejects_missing_file() {
        let err = PagedFile::open_existing("/nonexistent/path/does/not/exist.db").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn reopen_resumes_allocation_past_existing_pages() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        {
            let pf = PagedFile::create_new(&path).unwrap();
            for _ in 0..3 {
                let id = pf.allocate_page_id();
                pf.write_page(id, &[0u8; PAGE_SIZE]).unwrap();
            }
            pf.flush().unwrap();
        }
        let pf = PagedFile::open_existing(&path).unwrap();
        assert_eq!(pf.allocate_page_id(), 4);
    }
}
