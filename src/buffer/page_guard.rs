use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::Frame;

/// Callback invoked when a guard releases its page: receives the page ID
/// and whether the page was written through the guard.
type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// Common guard state: keeps the frame alive, tracks dirtiness, and fires
/// the release callback exactly once on drop.
struct PageGuardBase {
    page_id: PageId,
    /// Kept alive so the borrowed frame storage cannot be dropped
    _frame: Arc<Frame>,
    release_callback: Option<ReleaseCallback>,
    is_dirty: bool,
}

impl PageGuardBase {
    fn new(page_id: PageId, frame: Arc<Frame>, release_callback: ReleaseCallback) -> Self {
        Self {
            page_id,
            _frame: frame,
            release_callback: Some(release_callback),
            is_dirty: false,
        }
    }

    fn drop_impl(&mut self) {
        if let Some(callback) = self.release_callback.take() {
            callback(self.page_id, self.is_dirty);
        }
    }
}

/// RAII guard for read-only access to a cached page. The frame stays pinned
/// (and therefore ineligible for eviction) until the guard is dropped, which
/// closes the aliased-view hazard of handing out raw frame pointers.
pub struct ReadPageGuard {
    base: PageGuardBase,
    _data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
}

impl ReadPageGuard {
    /// # Safety
    /// The caller must ensure the frame outlives this guard; the buffer pool
    /// guarantees it by handing over an Arc to the frame.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<Frame>,
        release_callback: ReleaseCallback,
    ) -> Self {
        let data_guard = frame.data.read();
        // Extend to 'static: the Arc held in base keeps the frame alive
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            base: PageGuardBase::new(page_id, frame, release_callback),
            _data_guard: data_guard,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self._data_guard[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.base.drop_impl();
    }
}

/// RAII guard for read-write access to a cached page. Accessing the bytes
/// mutably records the dirtiness, which the buffer pool applies to the frame
/// when the guard is released. This replaces an explicit mark-dirty call:
/// the cache cannot detect mutation through an aliased view, but the guard
/// can observe it directly.
pub struct WritePageGuard {
    base: PageGuardBase,
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    /// # Safety
    /// The caller must ensure the frame outlives this guard; the buffer pool
    /// guarantees it by handing over an Arc to the frame.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<Frame>,
        release_callback: ReleaseCallback,
    ) -> Self {
        let data_guard = frame.data.write();
        // Extend to 'static: the Arc held in base keeps the frame alive
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            base: PageGuardBase::new(page_id, frame, release_callback),
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Returns a mutable view of the page bytes and marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.base.is_dirty = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the data lock before the callback re-enters the pool
        self.data_guard.take();
        self.base.drop_impl();
    }
}
