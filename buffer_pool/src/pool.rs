//! A single-threaded, clock-sweep buffer pool manager.
//!
//! Concurrent access is out of scope for the index this crate serves, so
//! unlike the teacher's actor/channel-based implementation, this one runs
//! synchronously on the caller's thread with no locks: `Rc<RefCell<_>>`
//! interior mutability is enough.

use crate::api::{BpmError, BufferPoolManager, PageGuard, PageId, PAGE_SIZE};
use paged_file::PagedFile;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use tracing::{debug, trace};

type FrameId = usize;

struct Frame {
    page_id: PageId,
    pin_count: usize,
    is_dirty: bool,
    is_referenced: bool,
}

struct Inner {
    frames: Vec<Frame>,
    frame_data: Vec<Box<[u8; PAGE_SIZE]>>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    paged_file: PagedFile,
    clock_hand: usize,
    pool_size: usize,
}

impl Inner {
    fn find_victim_frame(&mut self) -> Result<FrameId, BpmError> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }

        for _ in 0..(2 * self.pool_size) {
            let frame_id = self.clock_hand;
            if self.frames[frame_id].pin_count == 0 {
                if self.frames[frame_id].is_referenced {
                    self.frames[frame_id].is_referenced = false;
                } else {
                    self.clock_hand = (self.clock_hand + 1) % self.pool_size;
                    return Ok(frame_id);
                }
            }
            self.clock_hand = (self.clock_hand + 1) % self.pool_size;
        }

        debug!(pool_size = self.pool_size, "no free frames for eviction");
        Err(BpmError::NoFreeFrames)
    }

    fn evict_into(&mut self, frame_id: FrameId) -> Result<(), BpmError> {
        let old_page_id = self.frames[frame_id].page_id;
        if self.frames[frame_id].is_dirty {
            trace!(page_id = old_page_id, frame_id, "writing back dirty frame before eviction");
            self.paged_file.write_page(old_page_id, &self.frame_data[frame_id])?;
        }
        self.page_table.remove(&self.frames[frame_id].page_id);
        Ok(())
    }

    fn fetch(&mut self, page_id: PageId) -> Result<Box<[u8; PAGE_SIZE]>, BpmError> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id].pin_count += 1;
            self.frames[frame_id].is_referenced = true;
            return Ok(self.frame_data[frame_id].clone());
        }

        let frame_id = self.find_victim_frame()?;
        self.evict_into(frame_id)?;

        let data = self.paged_file.read_page(page_id)?;
        self.frame_data[frame_id] = Box::new(data);
        self.page_table.insert(page_id, frame_id);
        self.frames[frame_id] = Frame { page_id, pin_count: 1, is_dirty: false, is_referenced: true };

        Ok(self.frame_data[frame_id].clone())
    }

    fn alloc(&mut self) -> Result<(PageId, Box<[u8; PAGE_SIZE]>), BpmError> {
        let frame_id = self.find_victim_frame()?;
        self.evict_into(frame_id)?;

        let page_id = self.paged_file.allocate_page_id();
        let data = Box::new([0u8; PAGE_SIZE]);
        self.frame_data[frame_id] = data;
        self.page_table.insert(page_id, frame_id);
        self.frames[frame_id] = Frame { page_id, pin_count: 1, is_dirty: true, is_referenced: true };

        Ok((page_id, self.frame_data[frame_id].clone()))
    }

    fn unpin(&mut self, page_id: PageId, data: Box<[u8; PAGE_SIZE]>, is_dirty: bool) {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            if self.frames[frame_id].pin_count > 0 {
                self.frames[frame_id].pin_count -= 1;
            }
            if is_dirty {
                self.frames[frame_id].is_dirty = true;
                self.frame_data[frame_id] = data;
            }
        }
    }

    fn flush_one(&mut self, page_id: PageId) -> Result<(), BpmError> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            if self.frames[frame_id].is_dirty {
                self.paged_file.write_page(page_id, &self.frame_data[frame_id])?;
                self.frames[frame_id].is_dirty = false;
            }
        }
        Ok(())
    }

    fn flush_all(&mut self) -> Result<(), BpmError> {
        let dirty_pages: Vec<PageId> = self
            .page_table
            .iter()
            .filter(|(_, &frame_id)| self.frames[frame_id].is_dirty)
            .map(|(&page_id, _)| page_id)
            .collect();
        let count = dirty_pages.len();
        for page_id in dirty_pages {
            self.flush_one(page_id)?;
        }
        self.paged_file.flush()?;
        debug!(count, "flushed all dirty frames");
        Ok(())
    }
}

/// The concrete buffer pool manager: fixed frame count, clock-sweep eviction.
pub struct BufferPool {
    inner: Rc<RefCell<Inner>>,
}

impl BufferPool {
    /// Creates a buffer pool of `pool_size` frames over `paged_file`.
    pub fn new(pool_size: usize, paged_file: PagedFile) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut frame_data = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(Frame { page_id: 0, pin_count: 0, is_dirty: false, is_referenced: false });
            frame_data.push(Box::new([0u8; PAGE_SIZE]));
            free_list.push(i);
        }
        Self {
            inner: Rc::new(RefCell::new(Inner {
                frames,
                frame_data,
                page_table: HashMap::new(),
                free_list,
                paged_file,
                clock_hand: 0,
                pool_size,
            })),
        }
    }
}

/// A pinned frame's data, unpinning (and, if dirty, writing back into the
/// pool's frame) when dropped.
pub struct FramePageGuard {
    inner: Rc<RefCell<Inner>>,
    page_id: PageId,
    data: Option<Box<[u8; PAGE_SIZE]>>,
    is_dirty: bool,
}

impl PageGuard for FramePageGuard {
    fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for FramePageGuard {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data.as_ref().expect("guard data taken before drop")[..]
    }
}

impl DerefMut for FramePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.is_dirty = true;
        &mut self.data.as_mut().expect("guard data taken before drop")[..]
    }
}

impl Drop for FramePageGuard {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.inner.borrow_mut().unpin(self.page_id, data, self.is_dirty);
        }
    }
}

impl BufferPoolManager for BufferPool {
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BpmError> {
        let data = self.inner.borrow_mut().fetch(page_id)?;
        Ok(Box::new(FramePageGuard {
            inner: self.inner.clone(),
            page_id,
            data: Some(data),
            is_dirty: false,
        }))
    }

    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BpmError> {
        let (page_id, data) = self.inner.borrow_mut().alloc()?;
        Ok(Box::new(FramePageGuard {
            inner: self.inner.clone(),
            page_id,
            data: Some(data),
            is_dirty: true,
        }))
    }

    fn unpin_page(&self, _page_id: PageId) -> Result<(), BpmError> {
        // Real unpinning happens when the page's FramePageGuard drops.
        Ok(())
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BpmError> {
        self.inner.borrow_mut().flush_one(page_id)
    }

    fn flush_all_pages(&self) -> Result<(), BpmError> {
        self.inner.borrow_mut().flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn pool(size: usize) -> (BufferPool, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let pf = PagedFile::create_new(tmp.path()).unwrap();
        (BufferPool::new(size, pf), tmp)
    }

    #[test]
    fn new_page_is_pinned_and_dirty_by_default() {
        let (bpm, _tmp) = pool(4);
        let guard = bpm.new_page().unwrap();
        assert_ne!(guard.page_id(), 0);
    }

    #[test]
    fn write_then_refetch_sees_update() {
        let (bpm, _tmp) = pool(4);
        let page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard[0] = 0x42;
            guard.page_id()
        };
        let guard = bpm.fetch_page(page_id).unwrap();
        assert_eq!(guard[0], 0x42);
    }

    #[test]
    fn eviction_writes_back_dirty_frames() {
        let (bpm, _tmp) = pool(1);
        let first_id = {
            let mut guard = bpm.new_page().unwrap();
            guard[0] = 1;
            guard.page_id()
        };
        let second_id = {
            let mut guard = bpm.new_page().unwrap();
            guard[0] = 2;
            guard.page_id()
        };
        let guard = bpm.fetch_page(first_id).unwrap();
        assert_eq!(guard[0], 1);
        drop(guard);
        let guard = bpm.fetch_page(second_id).unwrap();
        assert_eq!(guard[0], 2);
    }

    #[test]
    fn exhausted_pool_reports_no_free_frames() {
        let (bpm, _tmp) = pool(1);
        let _held = bpm.new_page().unwrap();
        let err = bpm.new_page();
        assert!(matches!(err, Err(BpmError::NoFreeFrames)));
    }
}
