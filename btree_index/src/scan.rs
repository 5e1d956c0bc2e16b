//! The scan engine: a bounded range cursor over the leaf chain.
//!
//! The cursor never keeps a `PageGuard` alive across calls. Like the
//! teacher's own tree iterator, it remembers a `(leaf_page_id, slot)`
//! position and re-pins the leaf transiently inside whichever call needs
//! it; a guard pinning that page lives only for the duration of that one
//! call before dropping. This keeps `Cursor` a plain, movable struct
//! rather than a self-referential one, while still touching at most one
//! frame at a time, matching the resource model's "one pinned leaf while
//! a scan is active" in effect if not in literal continuous residency.

use crate::error::{IndexError, Result};
use crate::node::{NodeKind, NodeView};
use buffer_pool::api::{BufferPoolManager, PageId, INVALID_PAGE};
use relation::RowId;

/// The comparison a scan bound is checked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ScanOp {
    fn is_valid_low(self) -> bool {
        matches!(self, ScanOp::Gt | ScanOp::Gte)
    }

    fn is_valid_high(self) -> bool {
        matches!(self, ScanOp::Lt | ScanOp::Lte)
    }

    fn holds(self, candidate: i32, bound: i32) -> bool {
        match self {
            ScanOp::Gt => candidate > bound,
            ScanOp::Gte => candidate >= bound,
            ScanOp::Lt => candidate < bound,
            ScanOp::Lte => candidate <= bound,
        }
    }
}

enum State {
    Idle,
    Positioned { leaf: PageId, slot: usize },
    Drained,
}

/// A bounded range scan. Exactly one call sequence is legal: `start_scan`,
/// then any number of `next` calls, then `end_scan`.
pub struct Cursor {
    state: State,
    low: i32,
    low_op: ScanOp,
    high: i32,
    high_op: ScanOp,
}

impl Cursor {
    pub fn new() -> Self {
        Self { state: State::Idle, low: 0, low_op: ScanOp::Gte, high: 0, high_op: ScanOp::Lte }
    }

    /// Descends from `root` (always an interior node) using `low` as the
    /// probe key, pins the leaf it lands on, and linear-scans forward
    /// through the sibling chain for the first key satisfying both bounds.
    pub fn start_scan(
        &mut self,
        bpm: &dyn BufferPoolManager,
        root: PageId,
        inner_capacity: u16,
        low: i32,
        low_op: ScanOp,
        high: i32,
        high_op: ScanOp,
    ) -> Result<()> {
        if !low_op.is_valid_low() || !high_op.is_valid_high() {
            return Err(IndexError::BadOperator);
        }
        if low > high {
            return Err(IndexError::BadRange);
        }

        let mut page_id = root;
        let mut kind = NodeKind::Interior;
        let leaf_page_id = loop {
            match kind {
                NodeKind::Leaf => break page_id,
                NodeKind::Interior => {
                    let guard = bpm.fetch_page(page_id)?;
                    let view = NodeView::new(&guard[..], NodeKind::Interior, inner_capacity);
                    let child_index = view.find_index(low);
                    kind = if view.level() == 1 { NodeKind::Leaf } else { NodeKind::Interior };
                    page_id = view.child(child_index);
                }
            }
        };

        let mut leaf = leaf_page_id;
        loop {
            let guard = bpm.fetch_page(leaf)?;
            let view = NodeView::new(&guard[..], NodeKind::Leaf, inner_capacity);
            let count = view.key_count() as usize;

            let found = (0..count).find(|&slot| {
                let k = view.key(slot);
                low_op.holds(k, low) && high_op.holds(k, high)
            });

            if let Some(slot) = found {
                self.state = State::Positioned { leaf, slot };
                self.low = low;
                self.low_op = low_op;
                self.high = high;
                self.high_op = high_op;
                return Ok(());
            }

            let next_leaf = view.right_sibling();
            if next_leaf == INVALID_PAGE {
                return Err(IndexError::NoSuchKeyFound);
            }
            leaf = next_leaf;
        }
    }

    /// Returns the next matching record id, advancing the cursor.
    pub fn next(&mut self, bpm: &dyn BufferPoolManager, inner_capacity: u16) -> Result<RowId> {
        let (mut leaf, mut slot) = match self.state {
            State::Idle => return Err(IndexError::ScanNotInitialized),
            State::Drained => return Err(IndexError::IndexScanCompleted),
            State::Positioned { leaf, slot } => (leaf, slot),
        };

        loop {
            let guard = bpm.fetch_page(leaf)?;
            let view = NodeView::new(&guard[..], NodeKind::Leaf, inner_capacity);
            let count = view.key_count() as usize;

            if slot >= count {
                let next_leaf = view.right_sibling();
                if next_leaf == INVALID_PAGE {
                    self.state = State::Drained;
                    return Err(IndexError::IndexScanCompleted);
                }
                leaf = next_leaf;
                slot = 0;
                continue;
            }

            let key = view.key(slot);
            if self.low_op.holds(key, self.low) && self.high_op.holds(key, self.high) {
                let rid = view.rid(slot);
                self.state = State::Positioned { leaf, slot: slot + 1 };
                return Ok(rid);
            }

            // Keys are non-decreasing: once one fails the upper bound, no
            // later key in the chain can satisfy it either.
            self.state = State::Drained;
            return Err(IndexError::IndexScanCompleted);
        }
    }

    /// Deactivates the cursor. Must be called exactly once per successful
    /// `start_scan`.
    pub fn end_scan(&mut self) -> Result<()> {
        match self.state {
            State::Idle => Err(IndexError::ScanNotInitialized),
            State::Positioned { .. } | State::Drained => {
                self.state = State::Idle;
                Ok(())
            }
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}
