use std::path::Path;
use std::sync::Mutex;

use crate::contracts::{
    AllocError, CounterStore, IdAllocator, IdRange, LockResultExt, StoreError,
};
use crate::storage::FileCounterStore;

/// Allocator that persists every new high-water mark before granting ids.
///
/// A single mutex covers read → persist → advance, so allocations never
/// interleave and the in-memory counter only moves once the store has
/// durably accepted the new value. A crash between persist and return can
/// skip ids on the next start; it can never reissue one.
pub struct PersistentAllocator<S: CounterStore> {
    state: Mutex<CounterState<S>>,
    location: String,
}

struct CounterState<S> {
    /// Highest id granted so far.
    current: u64,
    store: S,
}

impl<S: CounterStore> PersistentAllocator<S> {
    /// Loads the last issued id from `store` and returns a ready allocator.
    pub fn initialize(mut store: S) -> Result<Self, StoreError> {
        let current = store.load()?;
        let location = store.location();

        Ok(Self {
            state: Mutex::new(CounterState { current, store }),
            location,
        })
    }

    /// Where the counter is persisted, for logs and diagnostics.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Reserves `count` ids and returns the counter value before the
    /// reservation.
    fn advance(&self, count: u64) -> Result<u64, AllocError> {
        let mut state = self.state.lock().map_lock_err()?;

        let previous = state.current;
        let candidate = previous
            .checked_add(count)
            .ok_or(AllocError::Overflow {
                current: previous,
                count,
            })?;

        // Persist must succeed before the counter moves.
        if let Err(e) = state.store.persist(candidate) {
            tracing::warn!(
                candidate,
                location = %self.location,
                error = %e,
                "Failed to persist id, allocation rejected"
            );
            return Err(e.into());
        }
        state.current = candidate;

        Ok(previous)
    }
}

impl PersistentAllocator<FileCounterStore> {
    /// Opens (or creates) the record in `dir` and restores the counter.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::initialize(FileCounterStore::open(dir)?)
    }
}

impl<S: CounterStore> IdAllocator for PersistentAllocator<S> {
    fn allocate_one(&self) -> Result<u64, AllocError> {
        let previous = self.advance(1)?;
        Ok(previous + 1)
    }

    fn allocate_block(&self, count: u64) -> Result<IdRange, AllocError> {
        if count == 0 {
            return Err(AllocError::EmptyBlock);
        }

        let previous = self.advance(count)?;
        Ok(IdRange {
            first: previous + 1,
            last: previous + count,
        })
    }

    fn current(&self) -> Result<u64, AllocError> {
        Ok(self.state.lock().map_lock_err()?.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCounterStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Store whose writes fail while `failing` is set.
    struct FlakyStore {
        value: u64,
        failing: Arc<AtomicBool>,
    }

    impl CounterStore for FlakyStore {
        fn load(&mut self) -> Result<u64, StoreError> {
            Ok(self.value)
        }

        fn persist(&mut self, value: u64) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Write {
                    path: "flaky".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.value = value;
            Ok(())
        }

        fn location(&self) -> String {
            "flaky".into()
        }
    }

    fn memory_allocator() -> PersistentAllocator<MemoryCounterStore> {
        PersistentAllocator::initialize(MemoryCounterStore::new()).unwrap()
    }

    #[test]
    fn allocate_one_counts_up_from_one() {
        let allocator = memory_allocator();
        for expected in 1..=100 {
            assert_eq!(allocator.allocate_one().unwrap(), expected);
        }
        assert_eq!(allocator.current().unwrap(), 100);
    }

    #[test]
    fn allocate_block_is_contiguous_with_previous_ids() {
        let allocator = memory_allocator();
        assert_eq!(allocator.allocate_one().unwrap(), 1);

        let block = allocator.allocate_block(10).unwrap();
        assert_eq!(block, IdRange { first: 2, last: 11 });
        assert_eq!(block.len(), 10);

        assert_eq!(allocator.allocate_one().unwrap(), 12);
    }

    #[test]
    fn block_of_one_matches_single_allocation() {
        let allocator = memory_allocator();
        let block = allocator.allocate_block(1).unwrap();
        assert_eq!(block, IdRange { first: 1, last: 1 });
    }

    #[test]
    fn empty_block_is_rejected_without_persisting() {
        let allocator = memory_allocator();
        allocator.allocate_one().unwrap();

        assert!(matches!(
            allocator.allocate_block(0),
            Err(AllocError::EmptyBlock)
        ));
        assert_eq!(allocator.current().unwrap(), 1);

        let state = allocator.state.lock().unwrap();
        assert_eq!(state.store.persist_count(), 1);
    }

    #[test]
    fn initialize_resumes_from_store() {
        let allocator =
            PersistentAllocator::initialize(MemoryCounterStore::starting_from(41)).unwrap();
        assert_eq!(allocator.current().unwrap(), 41);
        assert_eq!(allocator.allocate_one().unwrap(), 42);
    }

    #[test]
    fn overflow_is_rejected_and_leaves_counter_alone() {
        let allocator =
            PersistentAllocator::initialize(MemoryCounterStore::starting_from(u64::MAX - 5))
                .unwrap();

        match allocator.allocate_block(10) {
            Err(AllocError::Overflow { current, count }) => {
                assert_eq!(current, u64::MAX - 5);
                assert_eq!(count, 10);
            }
            other => panic!("expected Overflow, got {:?}", other),
        }

        let block = allocator.allocate_block(5).unwrap();
        assert_eq!(block.last, u64::MAX);
        assert!(matches!(
            allocator.allocate_one(),
            Err(AllocError::Overflow { .. })
        ));
    }

    #[test]
    fn failed_persist_grants_nothing_and_retry_reuses_candidate() {
        let failing = Arc::new(AtomicBool::new(false));
        let allocator = PersistentAllocator::initialize(FlakyStore {
            value: 0,
            failing: Arc::clone(&failing),
        })
        .unwrap();

        assert_eq!(allocator.allocate_one().unwrap(), 1);

        failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            allocator.allocate_one(),
            Err(AllocError::Store(StoreError::Write { .. }))
        ));
        assert!(matches!(
            allocator.allocate_block(5),
            Err(AllocError::Store(StoreError::Write { .. }))
        ));
        assert_eq!(allocator.current().unwrap(), 1);

        failing.store(false, Ordering::SeqCst);
        assert_eq!(allocator.allocate_one().unwrap(), 2);
    }

    #[test]
    fn concurrent_access_is_safe() {
        use std::thread;

        let allocator = Arc::new(memory_allocator());
        let mut handles = vec![];

        for _ in 0..10 {
            let allocator = Arc::clone(&allocator);
            handles.push(thread::spawn(move || {
                let mut values = vec![];
                for _ in 0..100 {
                    values.push(allocator.allocate_one().unwrap());
                }
                values
            }));
        }

        let mut all_values: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        all_values.sort();
        assert_eq!(all_values, (1..=1000).collect::<Vec<u64>>());
    }
}
