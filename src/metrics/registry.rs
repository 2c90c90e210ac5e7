//! Counters and gauges for the id service.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use super::Histogram;
use crate::contracts::IdRange;

/// Central registry for all service metrics.
#[derive(Default)]
pub struct MetricsRegistry {
    pub allocations: AllocationMetrics,
    pub http: HttpMetrics,
    start_time: OnceLock<Instant>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Self::default();
        let _ = registry.start_time.set(Instant::now());
        registry
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time
            .get()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Formats all metrics in Prometheus exposition format.
    ///
    /// `current_id` is read from the allocator by the caller so the registry
    /// stays free of allocator state.
    pub fn format_prometheus(&self, current_id: Option<u64>) -> String {
        let mut output = String::with_capacity(2048);

        if let Some(id) = current_id {
            write_gauge(
                &mut output,
                "idservice_current_id",
                "Highest id granted so far",
                id,
            );
        }
        write_gauge(
            &mut output,
            "idservice_uptime_seconds",
            "Seconds since the service started",
            self.uptime_secs() as u64,
        );
        self.allocations.write_prometheus(&mut output);
        self.http.write_prometheus(&mut output);

        output
    }
}

/// Metrics for the allocation path.
#[derive(Default)]
pub struct AllocationMetrics {
    /// Successful single-id allocations
    pub single_total: AtomicU64,
    /// Successful block allocations
    pub block_total: AtomicU64,
    /// Ids handed out across both kinds of allocation
    pub ids_issued_total: AtomicU64,
    /// Allocations that failed because the record could not be persisted
    pub persist_errors_total: AtomicU64,
    /// Allocations refused before touching the store (empty block, overflow)
    pub rejected_total: AtomicU64,
    /// Time spent inside the allocator, lock wait included
    pub latency_us: Histogram,
}

impl AllocationMetrics {
    #[inline]
    pub fn record_single(&self, latency_us: u64) {
        self.single_total.fetch_add(1, Ordering::Relaxed);
        self.ids_issued_total.fetch_add(1, Ordering::Relaxed);
        self.latency_us.observe(latency_us);
    }

    #[inline]
    pub fn record_block(&self, range: IdRange, latency_us: u64) {
        self.block_total.fetch_add(1, Ordering::Relaxed);
        self.ids_issued_total
            .fetch_add(range.len(), Ordering::Relaxed);
        self.latency_us.observe(latency_us);
    }

    #[inline]
    pub fn record_persist_error(&self) {
        self.persist_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejection(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    fn write_prometheus(&self, output: &mut String) {
        write_counter(
            output,
            "idservice_allocations_single_total",
            "Successful single-id allocations",
            self.single_total.load(Ordering::Relaxed),
        );
        write_counter(
            output,
            "idservice_allocations_block_total",
            "Successful block allocations",
            self.block_total.load(Ordering::Relaxed),
        );
        write_counter(
            output,
            "idservice_ids_issued_total",
            "Total ids handed out",
            self.ids_issued_total.load(Ordering::Relaxed),
        );
        write_counter(
            output,
            "idservice_persist_errors_total",
            "Allocations that failed to persist the id record",
            self.persist_errors_total.load(Ordering::Relaxed),
        );
        write_counter(
            output,
            "idservice_allocations_rejected_total",
            "Allocations refused before reaching the store",
            self.rejected_total.load(Ordering::Relaxed),
        );
        self.latency_us.write_prometheus(
            output,
            "idservice_allocation_latency_us",
            "Allocation latency in microseconds, lock wait and fsync included",
        );
        output.push('\n');
    }
}

/// Metrics for the HTTP surface.
#[derive(Default)]
pub struct HttpMetrics {
    pub requests_total: AtomicU64,
    pub bad_requests_total: AtomicU64,
    pub server_errors_total: AtomicU64,
}

impl HttpMetrics {
    #[inline]
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_bad_request(&self) {
        self.bad_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_server_error(&self) {
        self.server_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    fn write_prometheus(&self, output: &mut String) {
        write_counter(
            output,
            "idservice_http_requests_total",
            "Allocation requests received",
            self.requests_total.load(Ordering::Relaxed),
        );
        write_counter(
            output,
            "idservice_http_bad_requests_total",
            "Allocation requests answered with a 4xx status",
            self.bad_requests_total.load(Ordering::Relaxed),
        );
        write_counter(
            output,
            "idservice_http_server_errors_total",
            "Allocation requests answered with a 5xx status",
            self.server_errors_total.load(Ordering::Relaxed),
        );
    }
}

fn write_counter(output: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {} {}", name, help);
    let _ = writeln!(output, "# TYPE {} counter", name);
    let _ = writeln!(output, "{} {}", name, value);
    output.push('\n');
}

fn write_gauge(output: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {} {}", name, help);
    let _ = writeln!(output, "# TYPE {} gauge", name);
    let _ = writeln!(output, "{} {}", name, value);
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_allocations_count_every_id() {
        let metrics = AllocationMetrics::default();
        metrics.record_single(100);
        metrics.record_block(IdRange { first: 2, last: 11 }, 300);

        assert_eq!(metrics.single_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.block_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.ids_issued_total.load(Ordering::Relaxed), 11);
        assert_eq!(metrics.latency_us.count(), 2);
    }

    #[test]
    fn prometheus_output_includes_all_families() {
        let registry = MetricsRegistry::new();
        registry.allocations.record_single(50);
        registry.allocations.record_persist_error();
        registry.allocations.record_rejection();
        registry.http.record_request();
        registry.http.record_bad_request();

        let output = registry.format_prometheus(Some(7));
        assert!(output.contains("idservice_current_id 7"));
        assert!(output.contains("# TYPE idservice_current_id gauge"));
        assert!(output.contains("idservice_allocations_single_total 1"));
        assert!(output.contains("idservice_ids_issued_total 1"));
        assert!(output.contains("idservice_persist_errors_total 1"));
        assert!(output.contains("idservice_allocations_rejected_total 1"));
        assert!(output.contains("idservice_allocation_latency_us_count 1"));
        assert!(output.contains("idservice_http_requests_total 1"));
        assert!(output.contains("idservice_http_bad_requests_total 1"));
    }

    #[test]
    fn current_id_gauge_is_omitted_when_unknown() {
        let registry = MetricsRegistry::new();
        let output = registry.format_prometheus(None);
        assert!(!output.contains("idservice_current_id"));
        assert!(output.contains("idservice_uptime_seconds"));
    }
}
