use proptest::prelude::*;

use idservice::contracts::{CounterStore, IdAllocator, IdRange};
use idservice::storage::{parse_record, FileCounterStore, MemoryCounterStore, PersistentAllocator};
use tempfile::TempDir;

/// One allocator call: `None` for a single id, `Some(n)` for a block of `n`.
type Request = Option<u64>;

// =============================================================================
// Ids are contiguous and strictly increasing
// =============================================================================

/// Property: replaying any request sequence yields back-to-back ranges
/// starting at `start + 1`.
fn prop_allocations_are_contiguous<A: IdAllocator>(
    allocator: &A,
    start: u64,
    requests: &[Request],
) {
    let mut previous_last = start;

    for request in requests {
        let range = match request {
            None => {
                let id = allocator.allocate_one().expect("allocate_one should succeed");
                IdRange { first: id, last: id }
            }
            Some(count) => allocator
                .allocate_block(*count)
                .expect("allocate_block should succeed"),
        };

        assert_eq!(
            range.first,
            previous_last + 1,
            "allocation must start right after the previous one"
        );
        assert_eq!(range.len(), request.unwrap_or(1));
        previous_last = range.last;
    }

    assert_eq!(allocator.current().unwrap(), previous_last);
}

// =============================================================================
// Proptest strategies
// =============================================================================

prop_compose! {
    fn arb_request()(single in any::<bool>(), count in 1u64..1_000) -> Request {
        if single { None } else { Some(count) }
    }
}

prop_compose! {
    fn arb_requests(max_count: usize)(
        requests in prop::collection::vec(arb_request(), 1..max_count)
    ) -> Vec<Request> {
        requests
    }
}

#[test]
fn test_fresh_allocator_counts_from_one() {
    let allocator = PersistentAllocator::initialize(MemoryCounterStore::new()).unwrap();
    prop_allocations_are_contiguous(&allocator, 0, &[None; 1000]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_requests_are_contiguous_in_memory(
        start in 0u64..1_000_000_000,
        requests in arb_requests(50)
    ) {
        let allocator =
            PersistentAllocator::initialize(MemoryCounterStore::starting_from(start)).unwrap();
        prop_allocations_are_contiguous(&allocator, start, &requests);
    }

    #[test]
    fn test_requests_are_contiguous_on_disk(requests in arb_requests(10)) {
        let dir = TempDir::new().unwrap();
        let allocator = PersistentAllocator::open(dir.path()).unwrap();
        prop_allocations_are_contiguous(&allocator, 0, &requests);
    }

    /// Restart idempotence: persist V, reopen, next id is V + 1.
    #[test]
    fn test_restart_resumes_after_persisted_value(value in 0u64..u64::MAX) {
        let dir = TempDir::new().unwrap();
        {
            let mut store = FileCounterStore::open(dir.path()).unwrap();
            store.persist(value).unwrap();
        }

        let allocator = PersistentAllocator::open(dir.path()).unwrap();
        prop_assert_eq!(allocator.current().unwrap(), value);
        prop_assert_eq!(allocator.allocate_one().unwrap(), value + 1);
    }

    /// Anything that is not digits plus a line terminator is refused.
    #[test]
    fn test_parse_record_rejects_non_numeric_content(contents in "[^0-9]{1,16}") {
        prop_assert!(parse_record(&contents).is_err());
    }
}
