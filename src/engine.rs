use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{EngineConfig, PageId, Result};
use crate::index::BTreeIndex;
use crate::storage::disk::DiskManager;

/// StorageEngine wires the three layers together: it owns the paged store,
/// shares it into the buffer pool, and builds the index on top. All
/// configuration is supplied here and threaded down; nothing is ambient.
pub struct StorageEngine {
    disk: Arc<DiskManager>,
    bpm: Arc<BufferPoolManager>,
    tree: BTreeIndex,
}

impl StorageEngine {
    /// Opens (and truncates) the backing file at `path` and builds an empty
    /// engine with the given configuration.
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let disk = Arc::new(DiskManager::new(path)?);
        let bpm = Arc::new(BufferPoolManager::new(
            config.buffer_capacity,
            Arc::clone(&disk),
        ));
        let tree = BTreeIndex::new(Arc::clone(&bpm), config.max_keys)?;

        Ok(Self { disk, bpm, tree })
    }

    /// Inserts a key into the index.
    pub fn insert(&mut self, key: u32) -> Result<()> {
        self.tree.insert(key)
    }

    /// Writes every dirty cached page back to the store.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        self.disk.sync()
    }

    pub fn root_page_id(&self) -> PageId {
        self.tree.root_page_id()
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk
    }
}
