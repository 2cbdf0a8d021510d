use super::error::{EngineError, Result};
use super::types::{FrameId, PageId};

/// Size of a page in bytes (4 KB). The unit of disk I/O and cache residency.
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant, marks an empty frame or an absent reference
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Default number of buffer pool frames. Deliberately tiny so eviction
/// is exercised early.
pub const DEFAULT_BUFFER_CAPACITY: usize = 3;

/// Default maximum keys per B+Tree node before a split
pub const DEFAULT_MAX_KEYS: usize = 3;

/// Runtime configuration for the engine, supplied at construction and
/// threaded through each layer. Page size stays a compile-time constant
/// because frames are fixed `[u8; PAGE_SIZE]` buffers.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Number of resident frames in the buffer pool
    pub buffer_capacity: usize,
    /// Maximum keys a B+Tree node holds before splitting
    pub max_keys: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }
}

impl EngineConfig {
    pub fn new(buffer_capacity: usize, max_keys: usize) -> Self {
        Self {
            buffer_capacity,
            max_keys,
        }
    }

    /// Checks that the configuration is usable. Node-layout fit against
    /// PAGE_SIZE is validated separately by the index layer.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(EngineError::Config(
                "buffer capacity must be at least 1".into(),
            ));
        }
        if self.max_keys == 0 {
            return Err(EngineError::Config("max keys must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_capacity, 3);
        assert_eq!(config.max_keys, 3);
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(EngineConfig::new(0, 3).validate().is_err());
        assert!(EngineConfig::new(3, 0).validate().is_err());
    }
}
