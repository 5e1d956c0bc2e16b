//! The index's metadata page (always page 1).

use crate::key::KeyType;
use crate::node;
use buffer_pool::api::PageId;

const RELATION_NAME_LEN: usize = 64;
const RELATION_NAME_OFFSET: usize = 0;
const BYTE_OFFSET_OFFSET: usize = RELATION_NAME_OFFSET + RELATION_NAME_LEN;
const KEY_TYPE_OFFSET: usize = BYTE_OFFSET_OFFSET + 4;
const ROOT_PAGE_ID_OFFSET: usize = KEY_TYPE_OFFSET + 1;
const LEAF_CAPACITY_OFFSET: usize = ROOT_PAGE_ID_OFFSET + 8;
const INNER_CAPACITY_OFFSET: usize = LEAF_CAPACITY_OFFSET + 2;
pub const METADATA_SIZE: usize = INNER_CAPACITY_OFFSET + 2;

const CHILD_SIZE: usize = 8;

/// The header stored on the index's page 1.
///
/// `leaf_capacity`/`inner_capacity` are computed once from the page size
/// the index was created with and persisted here, so a reopened index
/// keeps using the fanout it was built with even if this crate's layout
/// constants change later.
#[derive(Debug, Clone, Copy)]
pub struct IndexMetadata {
    pub relation_name: [u8; RELATION_NAME_LEN],
    pub byte_offset: u32,
    pub key_type: KeyType,
    pub root_page_id: PageId,
    pub leaf_capacity: u16,
    pub inner_capacity: u16,
}

impl IndexMetadata {
    pub fn new(relation_name: &str, byte_offset: u32, key_type: KeyType, root_page_id: PageId, page_size: usize) -> Self {
        let (leaf_capacity, inner_capacity) = compute_fanout(page_size);
        Self::with_capacities(relation_name, byte_offset, key_type, root_page_id, leaf_capacity, inner_capacity)
    }

    /// Like `new`, but with the fanout supplied directly instead of
    /// derived from a page size. Lets tests pin the literal small
    /// capacities the production `compute_fanout` curve never produces
    /// together at realistic page sizes.
    pub fn with_capacities(
        relation_name: &str,
        byte_offset: u32,
        key_type: KeyType,
        root_page_id: PageId,
        leaf_capacity: u16,
        inner_capacity: u16,
    ) -> Self {
        let mut name_buf = [0u8; RELATION_NAME_LEN];
        let bytes = relation_name.as_bytes();
        let len = bytes.len().min(RELATION_NAME_LEN);
        name_buf[..len].copy_from_slice(&bytes[..len]);

        Self {
            relation_name: name_buf,
            byte_offset,
            key_type,
            root_page_id,
            leaf_capacity,
            inner_capacity,
        }
    }

    pub fn relation_name_str(&self) -> &str {
        let len = self.relation_name.iter().position(|&b| b == 0).unwrap_or(RELATION_NAME_LEN);
        std::str::from_utf8(&self.relation_name[..len]).unwrap_or("")
    }

    pub fn write_to(&self, data: &mut [u8]) {
        data[RELATION_NAME_OFFSET..RELATION_NAME_OFFSET + RELATION_NAME_LEN].copy_from_slice(&self.relation_name);
        data[BYTE_OFFSET_OFFSET..BYTE_OFFSET_OFFSET + 4].copy_from_slice(&self.byte_offset.to_le_bytes());
        data[KEY_TYPE_OFFSET] = self.key_type.tag();
        data[ROOT_PAGE_ID_OFFSET..ROOT_PAGE_ID_OFFSET + 8].copy_from_slice(&self.root_page_id.to_le_bytes());
        data[LEAF_CAPACITY_OFFSET..LEAF_CAPACITY_OFFSET + 2].copy_from_slice(&self.leaf_capacity.to_le_bytes());
        data[INNER_CAPACITY_OFFSET..INNER_CAPACITY_OFFSET + 2].copy_from_slice(&self.inner_capacity.to_le_bytes());
    }

    pub fn read_from(data: &[u8]) -> Option<Self> {
        let key_type = KeyType::from_tag(data[KEY_TYPE_OFFSET])?;
        let mut relation_name = [0u8; RELATION_NAME_LEN];
        relation_name.copy_from_slice(&data[RELATION_NAME_OFFSET..RELATION_NAME_OFFSET + RELATION_NAME_LEN]);
        let byte_offset = u32::from_le_bytes(data[BYTE_OFFSET_OFFSET..BYTE_OFFSET_OFFSET + 4].try_into().unwrap());
        let root_page_id = PageId::from_le_bytes(data[ROOT_PAGE_ID_OFFSET..ROOT_PAGE_ID_OFFSET + 8].try_into().unwrap());
        let leaf_capacity = u16::from_le_bytes(data[LEAF_CAPACITY_OFFSET..LEAF_CAPACITY_OFFSET + 2].try_into().unwrap());
        let inner_capacity = u16::from_le_bytes(data[INNER_CAPACITY_OFFSET..INNER_CAPACITY_OFFSET + 2].try_into().unwrap());

        Some(Self {
            relation_name,
            byte_offset,
            key_type,
            root_page_id,
            leaf_capacity,
            inner_capacity,
        })
    }
}

/// Derives `(leaf_capacity, inner_capacity)` so each node type exactly
/// fills a page of the given size.
pub fn compute_fanout(page_size: usize) -> (u16, u16) {
    let available = page_size - node::HEADER_SIZE;
    let leaf_capacity = available / node::LEAF_ENTRY_SIZE;

    // inner_capacity * (key + child) + one extra child <= available
    let inner_capacity = (available - CHILD_SIZE) / (4 + CHILD_SIZE);

    (leaf_capacity as u16, inner_capacity as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let meta = IndexMetadata::new("students", 4, KeyType::Integer, 2, 4096);
        let mut buf = vec![0u8; METADATA_SIZE];
        meta.write_to(&mut buf);

        let read_back = IndexMetadata::read_from(&buf).unwrap();
        assert_eq!(read_back.relation_name_str(), "students");
        assert_eq!(read_back.byte_offset, 4);
        assert_eq!(read_back.key_type, KeyType::Integer);
        assert_eq!(read_back.root_page_id, 2);
        assert_eq!(read_back.leaf_capacity, meta.leaf_capacity);
        assert_eq!(read_back.inner_capacity, meta.inner_capacity);
    }

    #[test]
    fn fanout_fits_within_page() {
        let (leaf_cap, inner_cap) = compute_fanout(4096);
        assert!(node::HEADER_SIZE + leaf_cap as usize * node::LEAF_ENTRY_SIZE <= 4096);
        assert!(node::HEADER_SIZE + inner_cap as usize * 4 + (inner_cap as usize + 1) * CHILD_SIZE <= 4096);
    }
}
