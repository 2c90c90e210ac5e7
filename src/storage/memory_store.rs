use crate::contracts::{CounterStore, StoreError};

/// Non-durable counter store that keeps the value in memory.
///
/// Loses everything on restart. Useful for benchmarks and tests that
/// exercise the allocator without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    value: u64,
    persist_count: u64,
}

impl MemoryCounterStore {
    /// Creates an empty store; the first allocated id will be 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that reports `value` as already issued.
    pub fn starting_from(value: u64) -> Self {
        Self {
            value,
            persist_count: 0,
        }
    }

    /// Number of successful `persist` calls.
    pub fn persist_count(&self) -> u64 {
        self.persist_count
    }
}

impl CounterStore for MemoryCounterStore {
    fn load(&mut self) -> Result<u64, StoreError> {
        Ok(self.value)
    }

    fn persist(&mut self, value: u64) -> Result<(), StoreError> {
        self.value = value;
        self.persist_count += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}
