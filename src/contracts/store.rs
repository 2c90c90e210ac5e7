use crate::contracts::error::StoreError;

/// Durable home of the last issued id.
///
/// # Invariants
/// - `persist(v)` returns only once `v` is on durable storage.
/// - After a successful `persist(v)`, a fresh `load()` over the same location
///   returns `v` (survives process restart).
/// - A failed `persist` leaves the previously persisted value readable.
///
/// Stores do no locking of their own; the allocator serializes every call.
pub trait CounterStore: Send {
    /// Reads the last persisted value.
    /// Returns 0 when nothing has been persisted yet.
    fn load(&mut self) -> Result<u64, StoreError>;

    /// Durably records `value` as the highest issued id.
    fn persist(&mut self, value: u64) -> Result<(), StoreError>;

    /// Human-readable location of the record, used in logs.
    fn location(&self) -> String;
}
