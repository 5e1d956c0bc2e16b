//! The tree mutator: recursive top-down insertion with eager splitting.
//!
//! Every recursive call holds at most one page pinned for the duration of
//! its own frame; pins accumulate down the call stack as recursion
//! descends (amortized `O(height)` total), and each frame's pin is
//! released by its `PageGuard`'s `Drop` when that frame returns. A
//! child's result is either "done" or a split record the caller must
//! install before its own guard drops.
//!
//! No page records whether it is a leaf or an interior node. The caller
//! always knows: the root is interior by construction, and an interior
//! node's own `level` field says whether ITS children are leaves
//! (`level == 1`) or further interior nodes (`level == 0`). `insert`
//! takes the current page's kind as a parameter rather than inspecting
//! the page to find out.

use crate::key::EMPTY_KEY;
use crate::node::{Node, NodeKind, NodeView};
use buffer_pool::api::{BufferPoolManager, PageId};
use relation::RowId;
use std::ops::DerefMut;
use tracing::debug;

/// What a recursive insert call reports to its caller.
pub enum InsertOutcome {
    /// The key was installed without growing the subtree.
    Done,
    /// The child split; `separator` must be installed in the parent,
    /// routing to `new_right` for keys `>= separator`.
    Split { separator: i32, new_right: PageId },
}

/// Allocates and initializes a new, empty leaf, returning its page id.
pub fn new_leaf(bpm: &dyn BufferPoolManager) -> crate::error::Result<PageId> {
    let mut guard = bpm.new_page()?;
    let page_id = guard.page_id();
    Node::new(guard.deref_mut(), NodeKind::Leaf, 0).initialize_leaf();
    Ok(page_id)
}

/// Allocates and initializes a new interior node at `level`, with its
/// first child pointer set to `first_child`.
pub fn new_interior(
    bpm: &dyn BufferPoolManager,
    level: u8,
    first_child: PageId,
    inner_capacity: u16,
) -> crate::error::Result<PageId> {
    let mut guard = bpm.new_page()?;
    let page_id = guard.page_id();
    Node::new(guard.deref_mut(), NodeKind::Interior, inner_capacity).initialize_interior(level, first_child);
    Ok(page_id)
}

/// Recursively inserts `(key, rid)` into the subtree rooted at `page_id`,
/// which the caller asserts is a page of kind `kind`.
pub fn insert(
    bpm: &dyn BufferPoolManager,
    page_id: PageId,
    kind: NodeKind,
    key: i32,
    rid: RowId,
    leaf_capacity: u16,
    inner_capacity: u16,
) -> crate::error::Result<InsertOutcome> {
    assert_ne!(key, EMPTY_KEY, "EMPTY_KEY is reserved and may not be inserted");

    let mut guard = bpm.fetch_page(page_id)?;

    if kind == NodeKind::Leaf {
        return insert_into_leaf(guard.deref_mut(), key, rid, leaf_capacity, inner_capacity, bpm);
    }

    let (child_index, child_page_id, child_kind) = {
        let view = NodeView::new(&guard[..], kind, inner_capacity);
        let child_index = view.find_index(key);
        let child_kind = if view.level() == 1 { NodeKind::Leaf } else { NodeKind::Interior };
        (child_index, view.child(child_index), child_kind)
    };

    let child_outcome = insert(bpm, child_page_id, child_kind, key, rid, leaf_capacity, inner_capacity)?;

    let (separator, new_right) = match child_outcome {
        InsertOutcome::Done => return Ok(InsertOutcome::Done),
        InsertOutcome::Split { separator, new_right } => (separator, new_right),
    };

    install_into_interior(bpm, guard.deref_mut(), child_index, separator, new_right, inner_capacity)
}

fn insert_into_leaf(
    data: &mut [u8],
    key: i32,
    rid: RowId,
    leaf_capacity: u16,
    inner_capacity: u16,
    bpm: &dyn BufferPoolManager,
) -> crate::error::Result<InsertOutcome> {
    let mut node = Node::new(data, NodeKind::Leaf, inner_capacity);

    if !node.is_full(leaf_capacity) {
        let index = node.find_index(key);
        node.insert_leaf_entry(index, key, rid);
        return Ok(InsertOutcome::Done);
    }

    split_leaf(bpm, data, key, rid, leaf_capacity, inner_capacity)
}

/// Splits a full leaf `L`, moving its upper half into a new leaf `R`,
/// then routes the incoming pair into whichever half it belongs in.
fn split_leaf(
    bpm: &dyn BufferPoolManager,
    left_data: &mut [u8],
    key: i32,
    rid: RowId,
    leaf_capacity: u16,
    inner_capacity: u16,
) -> crate::error::Result<InsertOutcome> {
    let mut right_guard = bpm.new_page()?;
    let right_page_id = right_guard.page_id();

    let split_point = leaf_capacity as usize / 2;
    let moved: Vec<(i32, RowId)> = {
        let left = NodeView::new(left_data, NodeKind::Leaf, inner_capacity);
        (split_point..left.key_count() as usize).map(|i| (left.key(i), left.rid(i))).collect()
    };
    let old_right_sibling = NodeView::new(left_data, NodeKind::Leaf, inner_capacity).right_sibling();

    {
        let mut right = Node::new(right_guard.deref_mut(), NodeKind::Leaf, inner_capacity);
        right.initialize_leaf();
        right.set_right_sibling(old_right_sibling);
        for (i, (k, r)) in moved.iter().enumerate() {
            right.insert_leaf_entry(i, *k, *r);
        }
    }

    truncate_leaf(left_data, split_point, right_page_id, inner_capacity);

    let separator = NodeView::new(&right_guard[..], NodeKind::Leaf, inner_capacity).key(0);
    debug!(separator, new_right = right_page_id, "leaf split");

    if key < separator {
        let mut left = Node::new(left_data, NodeKind::Leaf, inner_capacity);
        let index = left.find_index(key);
        left.insert_leaf_entry(index, key, rid);
    } else {
        let mut right = Node::new(right_guard.deref_mut(), NodeKind::Leaf, inner_capacity);
        let index = right.find_index(key);
        right.insert_leaf_entry(index, key, rid);
    }

    Ok(InsertOutcome::Split { separator, new_right: right_page_id })
}

/// Truncates a leaf's live prefix to `new_count` entries in place, and
/// points its sibling link at the freshly split-off right leaf.
fn truncate_leaf(data: &mut [u8], new_count: usize, new_right_sibling: PageId, inner_capacity: u16) {
    let kept: Vec<(i32, RowId)> = {
        let view = NodeView::new(data, NodeKind::Leaf, inner_capacity);
        (0..new_count).map(|i| (view.key(i), view.rid(i))).collect()
    };

    let mut node = Node::new(data, NodeKind::Leaf, inner_capacity);
    node.initialize_leaf();
    node.set_right_sibling(new_right_sibling);
    for (i, (k, r)) in kept.iter().enumerate() {
        node.insert_leaf_entry(i, *k, *r);
    }
}

/// Installs a split record into an interior node at `child_index`,
/// splitting the interior node itself first if it is full.
fn install_into_interior(
    bpm: &dyn BufferPoolManager,
    data: &mut [u8],
    child_index: usize,
    separator: i32,
    new_right_child: PageId,
    inner_capacity: u16,
) -> crate::error::Result<InsertOutcome> {
    let mut node = Node::new(data, NodeKind::Interior, inner_capacity);

    if !node.is_full(inner_capacity) {
        node.insert_interior_entry(child_index, separator, new_right_child);
        return Ok(InsertOutcome::Done);
    }

    split_interior(bpm, data, separator, new_right_child, inner_capacity)
}

/// Splits a full interior node `L`, promoting its middle key, then
/// routes the incoming separator into whichever half it belongs in.
fn split_interior(
    bpm: &dyn BufferPoolManager,
    left_data: &mut [u8],
    incoming_key: i32,
    incoming_child: PageId,
    inner_capacity: u16,
) -> crate::error::Result<InsertOutcome> {
    let m = inner_capacity as usize / 2;
    let (level, promoted_key, moved_keys, moved_children) = {
        let left = NodeView::new(left_data, NodeKind::Interior, inner_capacity);
        let count = left.key_count() as usize;
        let moved_keys: Vec<i32> = (m + 1..count).map(|i| left.key(i)).collect();
        let moved_children: Vec<PageId> = (m + 1..=count).map(|i| left.child(i)).collect();
        (left.level(), left.key(m), moved_keys, moved_children)
    };

    let mut right_guard = bpm.new_page()?;
    let right_page_id = right_guard.page_id();

    {
        let mut right = Node::new(right_guard.deref_mut(), NodeKind::Interior, inner_capacity);
        right.initialize_interior(level, moved_children[0]);
        for (i, (&k, &c)) in moved_keys.iter().zip(moved_children.iter().skip(1)).enumerate() {
            right.insert_interior_entry(i, k, c);
        }
    }

    truncate_interior(left_data, m, inner_capacity);
    debug!(promoted_key, new_right = right_page_id, level, "interior split");

    // Left still holds keys [0, m); right now holds what was [m+1, count).
    if incoming_key < promoted_key {
        let mut left = Node::new(left_data, NodeKind::Interior, inner_capacity);
        let index = left.find_index(incoming_key);
        left.insert_interior_entry(index, incoming_key, incoming_child);
    } else {
        let mut right = Node::new(right_guard.deref_mut(), NodeKind::Interior, inner_capacity);
        let index = right.find_index(incoming_key);
        right.insert_interior_entry(index, incoming_key, incoming_child);
    }

    Ok(InsertOutcome::Split { separator: promoted_key, new_right: right_page_id })
}

/// Truncates an interior node's live prefix to `new_count` keys (and
/// `new_count + 1` children) in place.
fn truncate_interior(data: &mut [u8], new_count: usize, inner_capacity: u16) {
    let (level, first_child, kept_keys, kept_children) = {
        let view = NodeView::new(data, NodeKind::Interior, inner_capacity);
        let level = view.level();
        let first_child = view.child(0);
        let keys: Vec<i32> = (0..new_count).map(|i| view.key(i)).collect();
        let children: Vec<PageId> = (1..=new_count).map(|i| view.child(i)).collect();
        (level, first_child, keys, children)
    };

    let mut node = Node::new(data, NodeKind::Interior, inner_capacity);
    node.initialize_interior(level, first_child);
    for (i, (&k, &c)) in kept_keys.iter().zip(kept_children.iter()).enumerate() {
        node.insert_interior_entry(i, k, c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer_pool::BufferPool;
    use paged_file::PagedFile;
    use std::rc::Rc;
    use tempfile::NamedTempFile;

    const LEAF_CAP: u16 = 4;
    const INNER_CAP: u16 = 3;

    fn bpm() -> (Rc<dyn BufferPoolManager>, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let pf = PagedFile::create_new(tmp.path()).unwrap();
        let pool: Rc<dyn BufferPoolManager> = Rc::new(BufferPool::new(16, pf));
        (pool, tmp)
    }

    fn leaf_keys(bpm: &dyn BufferPoolManager, page_id: PageId) -> Vec<i32> {
        let guard = bpm.fetch_page(page_id).unwrap();
        let view = NodeView::new(&guard[..], NodeKind::Leaf, INNER_CAP);
        (0..view.key_count() as usize).map(|i| view.key(i)).collect()
    }

    #[test]
    fn insert_into_a_non_full_leaf_does_not_split() {
        let (bpm, _tmp) = bpm();
        let root = new_leaf(bpm.as_ref()).unwrap();

        let outcome = insert(bpm.as_ref(), root, NodeKind::Leaf, 10, RowId::new(1, 0), LEAF_CAP, INNER_CAP).unwrap();
        assert!(matches!(outcome, InsertOutcome::Done));
        assert_eq!(leaf_keys(bpm.as_ref(), root), vec![10]);
    }

    #[test]
    fn inserting_past_leaf_capacity_splits_and_reports_separator() {
        let (bpm, _tmp) = bpm();
        let root = new_leaf(bpm.as_ref()).unwrap();

        for k in [1, 2, 3, 4] {
            let outcome = insert(bpm.as_ref(), root, NodeKind::Leaf, k, RowId::new(k as usize, 0), LEAF_CAP, INNER_CAP).unwrap();
            assert!(matches!(outcome, InsertOutcome::Done));
        }

        let outcome = insert(bpm.as_ref(), root, NodeKind::Leaf, 5, RowId::new(5, 0), LEAF_CAP, INNER_CAP).unwrap();
        match outcome {
            InsertOutcome::Split { separator, new_right } => {
                assert_eq!(separator, 3);
                assert_eq!(leaf_keys(bpm.as_ref(), root), vec![1, 2]);
                assert_eq!(leaf_keys(bpm.as_ref(), new_right), vec![3, 4, 5]);
            }
            InsertOutcome::Done => panic!("expected a split"),
        }
    }

    #[test]
    fn interior_overflow_splits_and_promotes_middle_key() {
        let (bpm, _tmp) = bpm();
        let left_leaf = new_leaf(bpm.as_ref()).unwrap();
        let root = new_interior(bpm.as_ref(), 1, left_leaf, INNER_CAP).unwrap();

        // Drive enough inserts through the root to force both leaf splits
        // and, eventually, an interior split of the root itself.
        let mut next_root_split = None;
        for k in 1..=13 {
            let outcome = insert(bpm.as_ref(), root, NodeKind::Interior, k, RowId::new(k as usize, 0), LEAF_CAP, INNER_CAP).unwrap();
            if let InsertOutcome::Split { separator, new_right } = outcome {
                next_root_split = Some((separator, new_right));
            }
        }

        let (_separator, new_right) = next_root_split.expect("root should have split under this load");
        // The split-off sibling must itself be a routable interior node.
        let guard = bpm.fetch_page(new_right).unwrap();
        let view = NodeView::new(&guard[..], NodeKind::Interior, INNER_CAP);
        assert!(view.key_count() > 0);
    }

    #[test]
    #[should_panic(expected = "EMPTY_KEY is reserved")]
    fn insert_rejects_empty_key() {
        let (bpm, _tmp) = bpm();
        let root = new_leaf(bpm.as_ref()).unwrap();
        let _ = insert(bpm.as_ref(), root, NodeKind::Leaf, crate::key::EMPTY_KEY, RowId::new(1, 0), LEAF_CAP, INNER_CAP);
    }

    #[test]
    fn duplicate_keys_preserve_insertion_order() {
        let (bpm, _tmp) = bpm();
        let root = new_leaf(bpm.as_ref()).unwrap();

        for label in [10, 20, 30] {
            insert(bpm.as_ref(), root, NodeKind::Leaf, 7, RowId::new(label, 0), LEAF_CAP, INNER_CAP).unwrap();
        }

        let guard = bpm.fetch_page(root).unwrap();
        let view = NodeView::new(&guard[..], NodeKind::Leaf, INNER_CAP);
        let rids: Vec<usize> = (0..view.key_count() as usize).map(|i| view.rid(i).page_id).collect();
        assert_eq!(rids, vec![10, 20, 30]);
    }
}
