//! Query statistics and the periodic statistics reporter.
//!
//! Counters are owned by the engine instance (not process-wide) and
//! updated with relaxed atomics on every query. A background reporter
//! thread logs the derived percentages once per interval; reporting is
//! best-effort and never affects matching.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Running counters for one engine instance.
#[derive(Debug, Default)]
pub struct FilterStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    filter_hits: AtomicU64,
    scan_nanos: AtomicU64,
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filter_hit(&self) {
        self.filter_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan_nanos(&self, nanos: u64) {
        self.scan_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Drain the nanoseconds spent in the query path since the last drain.
    fn take_scan_nanos(&self) -> u64 {
        self.scan_nanos.swap(0, Ordering::Relaxed)
    }

    /// A point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            filter_hits: self.filter_hits.load(Ordering::Relaxed),
            scan_nanos: self.scan_nanos.load(Ordering::Relaxed),
        }
    }
}

/// Counter values captured by [`FilterStats::snapshot`].
///
/// `scan_nanos` covers the time spent in the query path since the last
/// periodic report (the reporter drains it each tick).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub filter_hits: u64,
    pub scan_nanos: u64,
}

impl StatsSnapshot {
    /// Share of queries answered from the verdict caches, in percent.
    pub fn cache_hit_rate(&self) -> f64 {
        percentage(self.cache_hits, self.requests)
    }

    /// Share of queries that produced a "match" verdict, in percent.
    pub fn filter_hit_rate(&self) -> f64 {
        percentage(self.filter_hits, self.requests)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Background thread logging statistics once per interval.
///
/// Owned by the engine; stopping (or dropping) it wakes the thread and
/// joins it.
pub struct StatsReporter {
    shared: Arc<ReporterShared>,
    handle: Option<JoinHandle<()>>,
}

struct ReporterShared {
    stop: Mutex<bool>,
    stop_changed: Condvar,
}

impl StatsReporter {
    /// Spawn the reporter thread.
    pub fn start(stats: Arc<FilterStats>, interval: Duration) -> Self {
        let shared = Arc::new(ReporterShared {
            stop: Mutex::new(false),
            stop_changed: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("easyfilter-stats".to_string())
            .spawn(move || run(thread_shared, stats, interval));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("failed to start statistics reporter: {}", e);
                None
            }
        };

        Self { shared, handle }
    }

    /// Stop the reporter and join its thread.
    pub fn stop(&mut self) {
        *self.shared.stop.lock() = true;
        self.shared.stop_changed.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: Arc<ReporterShared>, stats: Arc<FilterStats>, interval: Duration) {
    let mut last_tick = Instant::now();
    let mut stopped = shared.stop.lock();
    while !*stopped {
        if !shared.stop_changed.wait_for(&mut stopped, interval).timed_out() {
            // Woken by stop(); the loop condition re-checks the flag.
            continue;
        }
        let now = Instant::now();
        report(&stats, now - last_tick);
        last_tick = now;
    }
}

/// Log the derived percentages for one interval.
///
/// Filter and cache rates are cumulative; the cpu share is the scan time
/// drained this interval over the wall time elapsed.
fn report(stats: &FilterStats, wall: Duration) {
    let snapshot = stats.snapshot();
    if snapshot.requests == 0 {
        return;
    }

    let scanned = stats.take_scan_nanos();
    let cpu = percentage(scanned, wall.as_nanos() as u64);
    log::info!(
        "filter {}%, cache {}%, cpu {}%",
        snapshot.filter_hit_rate() as u32,
        snapshot.cache_hit_rate() as u32,
        cpu as u32
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = FilterStats::new();
        stats.record_request();
        stats.record_request();
        stats.record_cache_hit();
        stats.record_filter_hit();
        stats.record_scan_nanos(1000);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.filter_hits, 1);
        assert_eq!(snapshot.scan_nanos, 1000);
    }

    #[test]
    fn test_rates() {
        let stats = FilterStats::new();
        for _ in 0..4 {
            stats.record_request();
        }
        stats.record_cache_hit();
        stats.record_filter_hit();
        stats.record_filter_hit();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hit_rate(), 25.0);
        assert_eq!(snapshot.filter_hit_rate(), 50.0);
    }

    #[test]
    fn test_rates_with_no_requests() {
        let snapshot = FilterStats::new().snapshot();
        assert_eq!(snapshot.cache_hit_rate(), 0.0);
        assert_eq!(snapshot.filter_hit_rate(), 0.0);
    }

    #[test]
    fn test_take_scan_nanos_drains() {
        let stats = FilterStats::new();
        stats.record_scan_nanos(500);
        assert_eq!(stats.take_scan_nanos(), 500);
        assert_eq!(stats.take_scan_nanos(), 0);
    }

    #[test]
    fn test_reporter_stops_promptly() {
        let stats = Arc::new(FilterStats::new());
        let mut reporter = StatsReporter::start(Arc::clone(&stats), Duration::from_secs(3600));

        let started = Instant::now();
        reporter.stop();
        assert!(started.elapsed() < Duration::from_secs(5));

        // Stopping again is a no-op.
        reporter.stop();
    }

    #[test]
    fn test_reporter_drop_stops() {
        let stats = Arc::new(FilterStats::new());
        let reporter = StatsReporter::start(stats, Duration::from_secs(3600));
        drop(reporter);
    }
}
