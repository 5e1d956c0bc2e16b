//! The opaque foreign reference a B+-tree index leaf stores.

use buffer_pool::api::PageId;

/// Identifies a record in a relation: the page it lives on and its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl RowId {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}
