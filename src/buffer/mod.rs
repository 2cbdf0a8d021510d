mod buffer_pool_manager;
mod frame;
mod lru_replacer;
mod page_guard;

pub use buffer_pool_manager::*;
pub use frame::*;
pub use lru_replacer::*;
pub use page_guard::*;
