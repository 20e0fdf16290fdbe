//! Lock-free session metrics and periodic reporting
//!
//! Counters are updated from the session task, the polling task and route
//! request tasks without locking. `report()` swaps the periodic counters to
//! zero and returns a snapshot.
//!
//! NOTE: All atomics use Relaxed ordering; these are statistical counters and
//! never drive session logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Route request latency bucket boundaries (milliseconds)
/// Buckets: ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, >6400
pub const ROUTE_LATENCY_BOUNDS: [u64; 8] = [50, 100, 200, 400, 800, 1600, 3200, 6400];
pub const ROUTE_LATENCY_BUCKETS: usize = 9;

#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    ROUTE_LATENCY_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Upper bound of the bucket holding the given percentile (last bucket reports 2x)
fn percentile_from_buckets(buckets: &[u64; ROUTE_LATENCY_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;
    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return ROUTE_LATENCY_BOUNDS.get(i).copied().unwrap_or(ROUTE_LATENCY_BOUNDS[7] * 2);
        }
    }
    ROUTE_LATENCY_BOUNDS[7] * 2
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Route requests issued (monotonic)
    route_requests: AtomicU64,
    /// Route responses applied to state (monotonic)
    route_applied: AtomicU64,
    /// Route responses that failed (monotonic)
    route_failures: AtomicU64,
    /// Responses dropped because a newer request superseded them (monotonic)
    route_stale_dropped: AtomicU64,
    /// Route latency histogram (reset on report)
    route_latency_buckets: [AtomicU64; ROUTE_LATENCY_BUCKETS],
    /// Route latency sum in ms (reset on report)
    route_latency_sum_ms: AtomicU64,
    /// Route latency max in ms (reset on report)
    route_latency_max_ms: AtomicU64,
    /// Completed route requests since last report (reset on report)
    route_completed_since_report: AtomicU64,
    /// Position fixes delivered (monotonic)
    position_fixes: AtomicU64,
    /// Position requests that failed (monotonic)
    position_failures: AtomicU64,
    /// Heading samples applied (monotonic)
    heading_samples: AtomicU64,
    /// View commands dropped because the view channel was full (monotonic)
    view_commands_dropped: AtomicU64,
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            route_requests: AtomicU64::new(0),
            route_applied: AtomicU64::new(0),
            route_failures: AtomicU64::new(0),
            route_stale_dropped: AtomicU64::new(0),
            route_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            route_latency_sum_ms: AtomicU64::new(0),
            route_latency_max_ms: AtomicU64::new(0),
            route_completed_since_report: AtomicU64::new(0),
            position_fixes: AtomicU64::new(0),
            position_failures: AtomicU64::new(0),
            heading_samples: AtomicU64::new(0),
            view_commands_dropped: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    pub fn record_route_request(&self) {
        self.route_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished route request, successful or not
    pub fn record_route_latency(&self, latency_ms: u64) {
        self.route_latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        self.route_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.route_latency_max_ms, latency_ms);
        self.route_completed_since_report.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_applied(&self) {
        self.route_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_failure(&self) {
        self.route_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_stale_dropped(&self) {
        self.route_stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_position_fix(&self) {
        self.position_fixes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_position_failure(&self) {
        self.position_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heading_sample(&self) {
        self.heading_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view_command_dropped(&self) {
        self.view_commands_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn route_requests(&self) -> u64 {
        self.route_requests.load(Ordering::Relaxed)
    }

    pub fn route_stale_dropped(&self) -> u64 {
        self.route_stale_dropped.load(Ordering::Relaxed)
    }

    pub fn position_failures(&self) -> u64 {
        self.position_failures.load(Ordering::Relaxed)
    }

    /// Snapshot the counters, resetting the periodic ones
    pub fn report(&self) -> MetricsSummary {
        let completed = self.route_completed_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.route_latency_sum_ms.swap(0, Ordering::Relaxed);
        let latency_max = self.route_latency_max_ms.swap(0, Ordering::Relaxed);

        let mut buckets = [0u64; ROUTE_LATENCY_BUCKETS];
        for (i, bucket) in self.route_latency_buckets.iter().enumerate() {
            buckets[i] = bucket.swap(0, Ordering::Relaxed);
        }

        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed.as_secs_f64()
        };

        MetricsSummary {
            route_requests: self.route_requests.load(Ordering::Relaxed),
            route_applied: self.route_applied.load(Ordering::Relaxed),
            route_failures: self.route_failures.load(Ordering::Relaxed),
            route_stale_dropped: self.route_stale_dropped.load(Ordering::Relaxed),
            routes_per_min: if elapsed_secs > 0.0 {
                completed as f64 * 60.0 / elapsed_secs
            } else {
                0.0
            },
            route_latency_avg_ms: if completed > 0 { latency_sum / completed } else { 0 },
            route_latency_max_ms: latency_max,
            route_latency_p95_ms: percentile_from_buckets(&buckets, 0.95),
            route_latency_buckets: buckets,
            position_fixes: self.position_fixes.load(Ordering::Relaxed),
            position_failures: self.position_failures.load(Ordering::Relaxed),
            heading_samples: self.heading_samples.load(Ordering::Relaxed),
            view_commands_dropped: self.view_commands_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub route_requests: u64,
    pub route_applied: u64,
    pub route_failures: u64,
    pub route_stale_dropped: u64,
    pub routes_per_min: f64,
    pub route_latency_avg_ms: u64,
    pub route_latency_max_ms: u64,
    pub route_latency_p95_ms: u64,
    pub route_latency_buckets: [u64; ROUTE_LATENCY_BUCKETS],
    pub position_fixes: u64,
    pub position_failures: u64,
    pub heading_samples: u64,
    pub view_commands_dropped: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            route_requests = %self.route_requests,
            route_applied = %self.route_applied,
            route_failures = %self.route_failures,
            route_stale_dropped = %self.route_stale_dropped,
            routes_per_min = format!("{:.1}", self.routes_per_min),
            route_avg_ms = %self.route_latency_avg_ms,
            route_max_ms = %self.route_latency_max_ms,
            route_p95_ms = %self.route_latency_p95_ms,
            position_fixes = %self.position_fixes,
            position_failures = %self.position_failures,
            heading_samples = %self.heading_samples,
            view_dropped = %self.view_commands_dropped,
            "metrics"
        );
    }
}
