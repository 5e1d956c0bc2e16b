//! A minimal fixed-width-record relation heap.
//!
//! Stands in for "the external relation file" the index is built over.
//! Out of scope for the index's own design, but real enough to exercise
//! bulk build and key extraction against.

use crate::error::RelationError;
use crate::row::RowId;
use buffer_pool::api::{BufferPoolManager, PageId, INVALID_PAGE, PAGE_SIZE};
use std::cell::Cell;
use std::ops::DerefMut;
use std::rc::Rc;
use tracing::trace;

const NEXT_PAGE_OFFSET: usize = 0;
const RECORD_COUNT_OFFSET: usize = 8;
const HEADER_SIZE: usize = 10;

fn next_page_id(data: &[u8]) -> PageId {
    PageId::from_le_bytes(data[NEXT_PAGE_OFFSET..NEXT_PAGE_OFFSET + 8].try_into().unwrap())
}

fn set_next_page_id(data: &mut [u8], id: PageId) {
    data[NEXT_PAGE_OFFSET..NEXT_PAGE_OFFSET + 8].copy_from_slice(&id.to_le_bytes());
}

fn record_count(data: &[u8]) -> u16 {
    u16::from_le_bytes(data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 2].try_into().unwrap())
}

fn set_record_count(data: &mut [u8], count: u16) {
    data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 2].copy_from_slice(&count.to_le_bytes());
}

/// A heap of fixed-width records, chained page to page.
pub struct RelationFile {
    bpm: Rc<dyn BufferPoolManager>,
    first_page_id: PageId,
    last_page_id: Cell<PageId>,
    record_width: usize,
    records_per_page: usize,
}

impl RelationFile {
    /// Creates a new, empty relation with the given fixed record width.
    pub fn new(bpm: Rc<dyn BufferPoolManager>, record_width: usize) -> Result<Self, RelationError> {
        let records_per_page = (PAGE_SIZE - HEADER_SIZE) / record_width;
        assert!(records_per_page > 0, "record_width too large for a single page");

        let mut guard = bpm.new_page()?;
        let page_id = guard.page_id();
        set_next_page_id(guard.deref_mut(), INVALID_PAGE);
        set_record_count(guard.deref_mut(), 0);
        drop(guard);

        Ok(Self {
            bpm,
            first_page_id: page_id,
            last_page_id: Cell::new(page_id),
            record_width,
            records_per_page,
        })
    }

    /// The page id of the first page in the chain, where scans start.
    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a fixed-width record, returning its `RowId`.
    pub fn append(&self, record: &[u8]) -> Result<RowId, RelationError> {
        assert_eq!(record.len(), self.record_width, "record width mismatch");

        let mut guard = self.bpm.fetch_page(self.last_page_id.get())?;
        let count = record_count(&guard);

        if (count as usize) < self.records_per_page {
            let offset = HEADER_SIZE + count as usize * self.record_width;
            guard.deref_mut()[offset..offset + self.record_width].copy_from_slice(record);
            set_record_count(guard.deref_mut(), count + 1);
            return Ok(RowId::new(self.last_page_id.get(), count));
        }

        // Current page is full: allocate a new one and link it in.
        let mut new_guard = self.bpm.new_page()?;
        let new_page_id = new_guard.page_id();
        set_next_page_id(new_guard.deref_mut(), INVALID_PAGE);
        set_record_count(new_guard.deref_mut(), 0);

        set_next_page_id(guard.deref_mut(), new_page_id);
        drop(guard);

        new_guard.deref_mut()[HEADER_SIZE..HEADER_SIZE + self.record_width].copy_from_slice(record);
        set_record_count(new_guard.deref_mut(), 1);
        drop(new_guard);

        self.last_page_id.set(new_page_id);
        trace!(new_page_id, "relation heap spilled to a new page");
        Ok(RowId::new(new_page_id, 0))
    }

    pub(crate) fn record_width(&self) -> usize {
        self.record_width
    }

    pub(crate) fn bpm(&self) -> &Rc<dyn BufferPoolManager> {
        &self.bpm
    }
}

pub(crate) fn record_offset(record_width: usize, slot: u16) -> usize {
    HEADER_SIZE + slot as usize * record_width
}

pub(crate) fn read_header(data: &[u8]) -> (PageId, u16) {
    (next_page_id(data), record_count(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer_pool::BufferPool;
    use paged_file::PagedFile;
    use tempfile::NamedTempFile;

    fn relation(record_width: usize) -> (RelationFile, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let pf = PagedFile::create_new(tmp.path()).unwrap();
        let bpm: Rc<dyn BufferPoolManager> = Rc::new(BufferPool::new(8, pf));
        (RelationFile::new(bpm, record_width).unwrap(), tmp)
    }

    #[test]
    fn append_assigns_increasing_slots_on_one_page() {
        let (rel, _tmp) = relation(4);
        let first = rel.append(&[1, 0, 0, 0]).unwrap();
        let second = rel.append(&[2, 0, 0, 0]).unwrap();
        assert_eq!(first.page_id, second.page_id);
        assert_eq!(first.slot_id, 0);
        assert_eq!(second.slot_id, 1);
    }

    #[test]
    fn append_spills_to_a_new_page_once_full() {
        let (rel, _tmp) = relation(4);
        let records_per_page = (PAGE_SIZE - HEADER_SIZE) / 4;
        let mut last = rel.append(&[0, 0, 0, 0]).unwrap();
        for _ in 1..records_per_page {
            last = rel.append(&[0, 0, 0, 0]).unwrap();
        }
        let spilled = rel.append(&[9, 9, 9, 9]).unwrap();
        assert_ne!(spilled.page_id, last.page_id);
        assert_eq!(spilled.slot_id, 0);
    }

    #[test]
    #[should_panic(expected = "record width mismatch")]
    fn append_rejects_wrong_width() {
        let (rel, _tmp) = relation(4);
        rel.append(&[1, 2, 3]).unwrap();
    }
}
