#![no_main]

use idservice::contracts::{CounterStore, IdAllocator};
use idservice::storage::{FileCounterStore, PersistentAllocator, RECORD_FILE_NAME};
use libfuzzer_sys::fuzz_target;
use tempfile::TempDir;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes on disk must either load or fail cleanly, never panic.
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(RECORD_FILE_NAME), data).unwrap();

    let mut store = FileCounterStore::open(dir.path()).unwrap();
    let Ok(loaded) = store.load() else {
        return;
    };

    // A record that loads must hand out the id right after it.
    let allocator = PersistentAllocator::initialize(store).unwrap();
    match allocator.allocate_one() {
        Ok(id) => assert_eq!(id, loaded + 1),
        Err(_) => assert_eq!(loaded, u64::MAX),
    }
});
