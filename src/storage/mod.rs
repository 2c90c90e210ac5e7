mod allocator;
mod file_store;
mod memory_store;

pub use allocator::PersistentAllocator;
pub use file_store::{format_record, parse_record, FileCounterStore, RECORD_FILE_NAME};
pub use memory_store::MemoryCounterStore;
