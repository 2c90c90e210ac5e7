pub mod allocator;
pub mod error;
pub mod store;

pub use allocator::{IdAllocator, IdRange};
pub use error::{AllocError, LockResultExt, StoreError};
pub use store::CounterStore;
