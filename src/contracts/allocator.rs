use serde::Serialize;

use crate::contracts::error::AllocError;

/// Inclusive range of freshly allocated ids, `[first, last]`.
///
/// Serializes as a two-element array, `[first, last]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "[u64; 2]")]
pub struct IdRange {
    pub first: u64,
    pub last: u64,
}

impl IdRange {
    /// Number of ids in the range. Never zero for a granted block.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.last - self.first + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

impl From<IdRange> for [u64; 2] {
    fn from(range: IdRange) -> Self {
        [range.first, range.last]
    }
}

/// Hands out unique, monotonically increasing ids.
///
/// # Invariants
/// - Every granted id is greater than every id granted before it.
/// - An id is durable before it is returned; it is never granted twice,
///   across restarts included.
/// - A failed call grants nothing and leaves the allocator usable.
pub trait IdAllocator: Send + Sync {
    /// Allocates a single id.
    fn allocate_one(&self) -> Result<u64, AllocError>;

    /// Allocates `count` contiguous ids.
    fn allocate_block(&self, count: u64) -> Result<IdRange, AllocError>;

    /// Returns the highest id granted so far (0 if none).
    fn current(&self) -> Result<u64, AllocError>;
}
