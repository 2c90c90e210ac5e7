//! Observability metrics for the id service.
//!
//! Everything here is lock-free atomics so recording never contends with the
//! allocator mutex.

pub mod histogram;
pub mod registry;

pub use histogram::{Histogram, HistogramSnapshot};
pub use registry::{AllocationMetrics, HttpMetrics, MetricsRegistry};
