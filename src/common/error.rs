use thiserror::Error;

use super::types::PageId;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
