//! A disk-resident B+-tree secondary index over a fixed-width signed
//! integer key, built against an external buffer manager and relation
//! scanner.
//!
//! The four components: [`node`] (the page codec), [`bptree`] (the tree
//! mutator: recursive top-down insertion with eager splitting),
//! [`scan`] (the bounded range cursor), and this module (index
//! lifecycle: create, open, bulk build).

mod bptree;
mod error;
mod key;
mod metadata;
mod node;
mod scan;

pub use error::{IndexError, Result};
pub use key::KeyType;
pub use scan::ScanOp;

use buffer_pool::api::{BufferPoolManager, PageId, PAGE_SIZE};
use metadata::IndexMetadata;
use node::{Node, NodeKind};
use relation::{RelationError, RelationFile, RelationScanner, RowId};
use scan::Cursor;
use std::cell::RefCell;
use std::ops::DerefMut;
use std::rc::Rc;
use tracing::{debug, info};

/// The metadata page is always the first page the backing file's buffer
/// manager allocates (see `paged_file::PagedFile`'s page-1 convention).
const METADATA_PAGE_ID: PageId = 1;

/// A B+-tree secondary index over one relation's fixed-width integer key.
pub struct BTreeIndex {
    bpm: Rc<dyn BufferPoolManager>,
    cursor: RefCell<Cursor>,
}

impl BTreeIndex {
    /// Builds a fresh index over `relation`: allocates the metadata page,
    /// an initial interior root (`level = 1`) over a single empty leaf,
    /// then bulk-loads every record the relation scanner produces.
    ///
    /// `bpm` must be backed by a freshly created, empty file of its own,
    /// distinct from the file backing `relation`: the first page it
    /// allocates becomes the metadata page, and a file shared with the
    /// relation would hand that page number to the relation's own first
    /// heap page instead.
    pub fn create(
        bpm: Rc<dyn BufferPoolManager>,
        relation: &RelationFile,
        relation_name: &str,
        byte_offset: u32,
        key_type: KeyType,
    ) -> Result<Self> {
        let (leaf_capacity, inner_capacity) = metadata::compute_fanout(PAGE_SIZE);
        Self::create_with_capacities(bpm, relation, relation_name, byte_offset, key_type, leaf_capacity, inner_capacity)
    }

    /// Like `create`, but with the leaf/interior fanout supplied directly
    /// instead of derived from the production page size. Exists so tests
    /// can exercise real split and height-growth code paths at small,
    /// literal capacities without needing thousands of keys.
    pub fn create_with_capacities(
        bpm: Rc<dyn BufferPoolManager>,
        relation: &RelationFile,
        relation_name: &str,
        byte_offset: u32,
        key_type: KeyType,
        leaf_capacity: u16,
        inner_capacity: u16,
    ) -> Result<Self> {
        let mut metadata_guard = bpm.new_page()?;
        let metadata_page_id = metadata_guard.page_id();
        debug_assert_eq!(metadata_page_id, METADATA_PAGE_ID, "metadata must be the first page allocated");

        let leaf = bptree::new_leaf(bpm.as_ref())?;
        let root = bptree::new_interior(bpm.as_ref(), 1, leaf, inner_capacity)?;

        let meta = IndexMetadata::with_capacities(relation_name, byte_offset, key_type, root, leaf_capacity, inner_capacity);
        meta.write_to(metadata_guard.deref_mut());
        drop(metadata_guard);

        info!(relation = relation_name, byte_offset, "creating index");

        let index = Self { bpm, cursor: RefCell::new(Cursor::new()) };
        index.build_from(relation, byte_offset)?;
        Ok(index)
    }

    /// Opens an existing index, validating that its stored metadata
    /// matches the relation name, byte offset, and key type the caller
    /// expects. Any mismatch raises `BadIndexInfo`.
    pub fn open(bpm: Rc<dyn BufferPoolManager>, relation_name: &str, byte_offset: u32, key_type: KeyType) -> Result<Self> {
        let meta = {
            let guard = bpm.fetch_page(METADATA_PAGE_ID)?;
            IndexMetadata::read_from(&guard[..]).ok_or(IndexError::BadIndexInfo)?
        };

        if meta.relation_name_str() != relation_name || meta.byte_offset != byte_offset || meta.key_type != key_type {
            return Err(IndexError::BadIndexInfo);
        }

        info!(relation = relation_name, byte_offset, "opened index");
        Ok(Self { bpm, cursor: RefCell::new(Cursor::new()) })
    }

    /// Inserts `(key, rid)`, growing the tree's height if the root splits.
    pub fn insert(&self, key: i32, rid: RowId) -> Result<()> {
        let meta = self.load_metadata()?;

        let outcome =
            bptree::insert(self.bpm.as_ref(), meta.root_page_id, NodeKind::Interior, key, rid, meta.leaf_capacity, meta.inner_capacity)?;

        if let bptree::InsertOutcome::Split { separator, new_right } = outcome {
            debug!(separator, "root split, growing tree height");
            let new_root = bptree::new_interior(self.bpm.as_ref(), 0, meta.root_page_id, meta.inner_capacity)?;
            {
                let mut guard = self.bpm.fetch_page(new_root)?;
                let mut node = Node::new(guard.deref_mut(), NodeKind::Interior, meta.inner_capacity);
                node.insert_interior_entry(0, separator, new_right);
            }
            self.update_root(new_root)?;
        }

        Ok(())
    }

    /// Activates a bounded range scan cursor.
    pub fn start_scan(&self, low: i32, low_op: ScanOp, high: i32, high_op: ScanOp) -> Result<()> {
        let meta = self.load_metadata()?;
        self.cursor.borrow_mut().start_scan(self.bpm.as_ref(), meta.root_page_id, meta.inner_capacity, low, low_op, high, high_op)
    }

    /// Returns the next matching record id.
    pub fn next(&self) -> Result<RowId> {
        let meta = self.load_metadata()?;
        self.cursor.borrow_mut().next(self.bpm.as_ref(), meta.inner_capacity)
    }

    /// Deactivates the scan cursor.
    pub fn end_scan(&self) -> Result<()> {
        self.cursor.borrow_mut().end_scan()
    }

    fn build_from(&self, relation: &RelationFile, byte_offset: u32) -> Result<()> {
        let mut scanner = RelationScanner::new(relation);
        let offset = byte_offset as usize;
        let mut built = 0usize;
        loop {
            match scanner.scan_next() {
                Ok(rid) => {
                    let key = extract_key(scanner.current_record(), offset);
                    self.insert(key, rid)?;
                    built += 1;
                }
                Err(RelationError::EndOfRelation) => {
                    info!(built, "bulk build complete");
                    return Ok(());
                }
                Err(RelationError::Bpm(err)) => return Err(err.into()),
            }
        }
    }

    fn load_metadata(&self) -> Result<IndexMetadata> {
        let guard = self.bpm.fetch_page(METADATA_PAGE_ID)?;
        IndexMetadata::read_from(&guard[..]).ok_or(IndexError::BadIndexInfo)
    }

    fn update_root(&self, new_root: PageId) -> Result<()> {
        let mut meta = self.load_metadata()?;
        meta.root_page_id = new_root;
        let mut guard = self.bpm.fetch_page(METADATA_PAGE_ID)?;
        meta.write_to(guard.deref_mut());
        Ok(())
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        let _ = self.cursor.borrow_mut().end_scan();
        if let Err(err) = self.bpm.flush_all_pages() {
            debug!(%err, "failed to flush index on drop");
        }
    }
}

fn extract_key(record: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(record[offset..offset + 4].try_into().unwrap())
}
