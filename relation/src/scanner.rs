//! A sequential scanner over a `RelationFile`, page by page, slot by slot.

use crate::error::RelationError;
use crate::heap::{read_header, record_offset, RelationFile};
use crate::row::RowId;
use buffer_pool::api::{PageId, INVALID_PAGE};

/// Walks a relation heap in page order, handing back one record at a time.
///
/// Mirrors the shape of a sequential table scan: `scan_next` advances the
/// cursor and raises [`RelationError::EndOfRelation`] once the last page's
/// last slot has been consumed. A bulk index build treats that error as
/// ordinary completion, never as a failure.
pub struct RelationScanner<'a> {
    relation: &'a RelationFile,
    current_page_id: PageId,
    current_slot: u16,
    current_record: Vec<u8>,
}

impl<'a> RelationScanner<'a> {
    /// Positions a new scanner at the first record of the relation.
    pub fn new(relation: &'a RelationFile) -> Self {
        Self {
            relation,
            current_page_id: relation.first_page_id(),
            current_slot: 0,
            current_record: vec![0u8; relation.record_width()],
        }
    }

    /// Advances to the next record, returning its `RowId`.
    ///
    /// The record's bytes become available via [`Self::current_record`]
    /// until the next call. Returns `RelationError::EndOfRelation` once
    /// every page in the chain has been exhausted.
    pub fn scan_next(&mut self) -> Result<RowId, RelationError> {
        loop {
            if self.current_page_id == INVALID_PAGE {
                return Err(RelationError::EndOfRelation);
            }

            let guard = self.relation.bpm().fetch_page(self.current_page_id)?;
            let (next_page_id, count) = read_header(&guard);

            if self.current_slot < count {
                let width = self.relation.record_width();
                let offset = record_offset(width, self.current_slot);
                self.current_record.copy_from_slice(&guard[offset..offset + width]);
                let row_id = RowId::new(self.current_page_id, self.current_slot);
                drop(guard);

                self.current_slot += 1;
                return Ok(row_id);
            }

            drop(guard);
            self.current_page_id = next_page_id;
            self.current_slot = 0;
        }
    }

    /// The bytes of the record most recently returned by `scan_next`.
    pub fn current_record(&self) -> &[u8] {
        &self.current_record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer_pool::api::BufferPoolManager;
    use buffer_pool::BufferPool;
    use paged_file::PagedFile;
    use std::rc::Rc;
    use tempfile::NamedTempFile;

    fn relation(record_width: usize) -> (RelationFile, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let pf = PagedFile::create_new(tmp.path()).unwrap();
        let bpm: Rc<dyn BufferPoolManager> = Rc::new(BufferPool::new(8, pf));
        (RelationFile::new(bpm, record_width).unwrap(), tmp)
    }

    #[test]
    fn scan_visits_records_in_insertion_order() {
        let (rel, _tmp) = relation(4);
        for i in 0u32..5 {
            rel.append(&i.to_le_bytes()).unwrap();
        }

        let mut scanner = RelationScanner::new(&rel);
        for expected in 0u32..5 {
            let row_id = scanner.scan_next().unwrap();
            assert_eq!(row_id.slot_id as u32, expected);
            assert_eq!(u32::from_le_bytes(scanner.current_record().try_into().unwrap()), expected);
        }
    }

    #[test]
    fn scan_reports_end_of_relation_once_exhausted() {
        let (rel, _tmp) = relation(4);
        rel.append(&[1, 0, 0, 0]).unwrap();

        let mut scanner = RelationScanner::new(&rel);
        scanner.scan_next().unwrap();
        assert!(matches!(scanner.scan_next(), Err(RelationError::EndOfRelation)));
    }

    #[test]
    fn scan_crosses_page_boundaries() {
        let (rel, _tmp) = relation(4);
        let records_per_page = (buffer_pool::api::PAGE_SIZE - 10) / 4;
        let total = records_per_page + 3;
        for i in 0u32..total as u32 {
            rel.append(&i.to_le_bytes()).unwrap();
        }

        let mut scanner = RelationScanner::new(&rel);
        let mut seen = 0;
        loop {
            match scanner.scan_next() {
                Ok(_) => seen += 1,
                Err(RelationError::EndOfRelation) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(seen, total);
    }
}
