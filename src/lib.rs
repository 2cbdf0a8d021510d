//! pagedb - a minimal paged storage engine in Rust
//!
//! This crate implements the storage core of a single-process database:
//! data lives in fixed 4 KB pages on disk, a bounded buffer pool caches
//! pages in memory, and a B+Tree organizes ordered keys across pages.
//!
//! # Architecture
//!
//! Three layers, each depending only on the one below:
//!
//! - **Paged Store** (`storage`): fixed-block read/write over a single
//!   file, addressed by zero-based page identifier
//!   - `DiskManager`: maps page IDs to byte offsets and performs the I/O
//!
//! - **Buffer Pool** (`buffer`): bounded in-memory cache over the store
//!   - `BufferPoolManager`: resolves page IDs to frames, allocates new
//!     pages, evicts with write-back
//!   - `LruReplacer`: exact least-recently-used victim selection
//!   - `Frame`: per-slot metadata (resident page, dirty flag, pin count)
//!     and the page bytes
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pins over cached pages
//!
//! - **Index** (`index`): a B+Tree whose nodes are fixed-size binary
//!   records inside pages
//!   - `BTreeIndex`: leaf insert, splits, and cascading key promotion
//!   - `BTreeNode`/`BTreeNodeRef`: the on-page node encoding
//!
//! The `StorageEngine` facade owns the store and threads an
//! `EngineConfig` through construction of each layer.
//!
//! # Example
//!
//! ```rust,no_run
//! use pagedb::{EngineConfig, StorageEngine};
//!
//! let mut engine = StorageEngine::open("test.db", EngineConfig::default()).unwrap();
//!
//! for key in [10, 20, 30, 40, 50] {
//!     engine.insert(key).unwrap();
//! }
//! engine.flush().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod engine;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{EngineConfig, EngineError, FrameId, PageId, Result};
pub use engine::StorageEngine;
