use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{EngineError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::DiskManager;

use super::{Frame, LruReplacer, ReadPageGuard, WritePageGuard};

/// Pool state shared with the release callbacks of outstanding guards
struct BufferPoolState {
    /// The pre-allocated frames; their storage never moves
    frames: Vec<Arc<Frame>>,
    /// Page table: resident page ID to frame ID, entries exist exactly for
    /// cached pages
    page_table: Mutex<HashMap<PageId, FrameId>>,
    /// Frames never yet used, consumed in index order before any eviction
    free_list: Mutex<VecDeque<FrameId>>,
    /// LRU victim selection
    replacer: LruReplacer,
}

/// BufferPoolManager is the cache layer: a bounded set of in-memory frames
/// over the paged store, with LRU eviction and dirty write-back. It is the
/// sole path by which any other component touches page bytes, and it owns
/// page allocation - identifiers are handed out monotonically and never
/// reused.
pub struct BufferPoolManager {
    /// Number of frames in the pool
    capacity: usize,
    /// Shared state
    state: Arc<BufferPoolState>,
    /// The paged store beneath this cache
    disk: Arc<DiskManager>,
    /// Next page identifier to assign
    next_page_id: AtomicU32,
    /// Number of evictions performed since construction
    num_evictions: AtomicU32,
}

impl BufferPoolManager {
    /// Creates a buffer pool with `capacity` frames over the given store.
    pub fn new(capacity: usize, disk: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(capacity);
        let mut free_list = VecDeque::with_capacity(capacity);

        for i in 0..capacity {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            page_table: Mutex::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: LruReplacer::new(capacity),
        });

        Self {
            capacity,
            state,
            disk,
            next_page_id: AtomicU32::new(0),
            num_evictions: AtomicU32::new(0),
        }
    }

    /// Allocates a new page: assigns the next identifier, takes a frame
    /// (evicting if necessary), zero-fills it and marks it dirty so the
    /// page reaches disk even if it is evicted before any further write.
    /// Returns the new page ID; the page is resident and evictable until a
    /// guard pins it.
    pub fn new_page(&self) -> Result<PageId> {
        let frame_id = self.get_free_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst));
        debug!(page = page_id.as_u32(), "allocating new page");

        frame.reset();
        frame.set_page_id(page_id);
        frame.set_dirty(true);

        self.state.page_table.lock().insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, true);

        Ok(page_id)
    }

    /// Fetches a page for read access, pinning its frame for the lifetime
    /// of the returned guard.
    pub fn checked_read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        if page_id == INVALID_PAGE_ID {
            return Err(EngineError::InvalidPageId(page_id));
        }

        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            ReadPageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| Self::release_page(&state, pid, is_dirty)),
            )
        };

        Ok(guard)
    }

    /// Fetches a page for write access, pinning its frame for the lifetime
    /// of the returned guard. Mutation through the guard marks the frame
    /// dirty on release.
    pub fn checked_write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        if page_id == INVALID_PAGE_ID {
            return Err(EngineError::InvalidPageId(page_id));
        }

        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            WritePageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| Self::release_page(&state, pid, is_dirty)),
            )
        };

        Ok(guard)
    }

    /// Writes a resident page back to the store and clears its dirty flag.
    /// Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(EngineError::InvalidPageId(page_id));
        }

        let page_table = self.state.page_table.lock();

        if let Some(&frame_id) = page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];

            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk.write_page(page_id, &data)?;
            frame.set_dirty(false);

            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Writes every dirty resident page back to the store.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_table = self.state.page_table.lock();

        for (&page_id, &frame_id) in page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];

            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk.write_page(page_id, &data)?;
                frame.set_dirty(false);
            }
        }

        Ok(())
    }

    /// Returns the pin count for a page, or None if it is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.state
            .page_table
            .lock()
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    /// Returns the pool capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of frames never yet used.
    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    /// Returns the number of currently resident pages.
    pub fn resident_count(&self) -> usize {
        self.state.page_table.lock().len()
    }

    /// Returns the number of pages allocated so far.
    pub fn allocated_count(&self) -> u32 {
        self.next_page_id.load(Ordering::Relaxed)
    }

    /// Returns the number of evictions performed since construction.
    pub fn eviction_count(&self) -> u32 {
        self.num_evictions.load(Ordering::Relaxed)
    }

    /// Guard release path: applies recorded dirtiness, unpins, and makes
    /// the frame evictable again once no guard holds it.
    fn release_page(state: &BufferPoolState, page_id: PageId, is_dirty: bool) {
        let page_table = state.page_table.lock();
        if let Some(&frame_id) = page_table.get(&page_id) {
            let frame = &state.frames[frame_id.as_usize()];
            if is_dirty {
                frame.set_dirty(true);
            }
            if let Some(0) = frame.unpin() {
                state.replacer.set_evictable(frame_id, true);
            }
        }
    }

    /// Resolves a page to a frame, pinning it. A resident page is a cache
    /// hit; otherwise a frame is obtained (evicting if needed) and the page
    /// is read from the store with its dirty flag cleared.
    fn fetch_page(&self, page_id: PageId) -> Result<FrameId> {
        {
            let page_table = self.state.page_table.lock();
            if let Some(&frame_id) = page_table.get(&page_id) {
                debug!(page = page_id.as_u32(), "cache hit");
                let frame = &self.state.frames[frame_id.as_usize()];
                frame.pin();
                self.state.replacer.record_access(frame_id);
                self.state.replacer.set_evictable(frame_id, false);
                return Ok(frame_id);
            }
        }

        debug!(page = page_id.as_u32(), "cache miss");
        let frame_id = self.get_free_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk.read_page(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();

        self.state.page_table.lock().insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    /// Obtains a frame for a new resident: the next never-used frame if one
    /// remains, otherwise the LRU victim. A dirty victim is written back
    /// before its frame is reused. Fails with BufferPoolFull when every
    /// resident frame is pinned.
    fn get_free_frame(&self) -> Result<FrameId> {
        {
            let mut free_list = self.state.free_list.lock();
            if let Some(frame_id) = free_list.pop_front() {
                return Ok(frame_id);
            }
        }

        if let Some(frame_id) = self.state.replacer.evict() {
            let frame = &self.state.frames[frame_id.as_usize()];
            let old_page_id = frame.page_id();
            debug!(
                page = old_page_id.as_u32(),
                dirty = frame.is_dirty(),
                "evicting page"
            );

            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk.write_page(old_page_id, &data)?;
            }

            self.state.page_table.lock().remove(&old_page_id);
            frame.reset();
            self.num_evictions.fetch_add(1, Ordering::Relaxed);

            Ok(frame_id)
        } else {
            Err(EngineError::BufferPoolFull)
        }
    }
}
