//! The filter engine façade.
//!
//! [`FilterEngine`] is the single entry point used by the host
//! application: it owns the active [`RuleStore`], the two verdict caches,
//! and the statistics, and orchestrates the asynchronous load pipeline
//! (local snapshot, persisted caches, conditional remote refresh).
//!
//! Queries are valid in every lifecycle state. Before any rules arrive
//! they see an empty store and return `false`: a filter may under-block
//! during warm-up but must never over-block, and must never make the
//! caller wait on the load pipeline.

use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::UrlCache;
use crate::config::FilterConfig;
use crate::rule::normalize_url;
use crate::snapshot::Snapshot;
use crate::source::{HttpSource, RuleSource};
use crate::stats::{FilterStats, StatsReporter, StatsSnapshot};
use crate::store::RuleStore;

/// Engine lifecycle.
///
/// `Ready` means all background load work has settled; queries are
/// accepted in every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed; `load()` not yet invoked.
    Created,
    /// Restoring the persisted rule snapshot.
    LoadingSnapshot,
    /// Restoring the persisted verdict caches.
    LoadingCaches,
    /// Fetching remote subscription endpoints.
    Refreshing,
    /// Background work settled.
    Ready,
}

impl EngineState {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Created => "created",
            EngineState::LoadingSnapshot => "loading-snapshot",
            EngineState::LoadingCaches => "loading-caches",
            EngineState::Refreshing => "refreshing",
            EngineState::Ready => "ready",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// URL-filtering engine: decides, per URL, whether an exclusion rule
/// ("block") or an exception rule ("allow anyway") matches.
///
/// Construction never touches the network or the disk and never fails;
/// call [`load`](FilterEngine::load) to start the background pipeline.
/// The engine is `Send + Sync`; share it behind an `Arc` and query it
/// from any thread.
///
/// # Example
///
/// ```ignore
/// use easyfilter::{FilterConfig, FilterEngine};
///
/// let engine = FilterEngine::new(FilterConfig::default());
/// engine.load();
///
/// // Decide whether to block a request.
/// let url = "http://ads.doubleclick.net/banner";
/// let block = engine.matches_exclusion(url)
///     && !(engine.is_with_exception() && engine.matches_exception(url));
/// ```
pub struct FilterEngine {
    shared: Arc<EngineShared>,
    reporter: Option<StatsReporter>,
}

struct EngineShared {
    config: FilterConfig,
    snapshot: Snapshot,
    /// Active store; replaced by whole-store pointer swaps, never mutated
    /// in place under readers.
    store: ArcSwap<RuleStore>,
    exception_cache: UrlCache,
    exclusion_cache: UrlCache,
    stats: Arc<FilterStats>,
    with_exception: AtomicBool,
    load_started: AtomicBool,
    state: Mutex<EngineState>,
    state_changed: Condvar,
    sources: Mutex<Vec<Box<dyn RuleSource>>>,
}

impl FilterEngine {
    /// Create an engine from a configuration.
    ///
    /// One [`HttpSource`] is set up per configured endpoint; the
    /// statistics reporter starts immediately.
    pub fn new(config: FilterConfig) -> Self {
        let sources: Vec<Box<dyn RuleSource>> = config
            .endpoints
            .iter()
            .map(|url| Box::new(HttpSource::new(url, config.http_timeout())) as Box<dyn RuleSource>)
            .collect();

        let snapshot = Snapshot::new(config.cache_dir.clone());
        let exception_cache = UrlCache::new("exceptions", config.cache_capacity);
        let exclusion_cache = UrlCache::new("exclusions", config.cache_capacity);
        let stats = Arc::new(FilterStats::new());
        let with_exception = AtomicBool::new(config.with_exception);
        let reporter = StatsReporter::start(Arc::clone(&stats), config.report_interval());

        let shared = Arc::new(EngineShared {
            config,
            snapshot,
            store: ArcSwap::from_pointee(RuleStore::new()),
            exception_cache,
            exclusion_cache,
            stats,
            with_exception,
            load_started: AtomicBool::new(false),
            state: Mutex::new(EngineState::Created),
            state_changed: Condvar::new(),
            sources: Mutex::new(sources),
        });

        Self {
            shared,
            reporter: Some(reporter),
        }
    }

    /// Replace the rule sources built from the configured endpoints.
    ///
    /// Call before [`load`](FilterEngine::load); used by tools and tests
    /// to inject sources.
    pub fn with_sources(self, sources: Vec<Box<dyn RuleSource>>) -> Self {
        *self.shared.sources.lock() = sources;
        self
    }

    /// Start the background load pipeline and return immediately.
    ///
    /// The pipeline restores the persisted snapshot, then the verdict
    /// caches. If the snapshot is older than the refresh threshold or
    /// either rule set came back empty, it then fetches the remote
    /// endpoints in order, publishing after each one so partial progress
    /// serves queries right away, and finally persists the refreshed
    /// state.
    ///
    /// Meant to be called once per engine; repeat calls are logged and
    /// ignored.
    pub fn load(&self) {
        if self.shared.load_started.swap(true, Ordering::SeqCst) {
            log::warn!("load() already invoked for this engine, ignoring");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("easyfilter-load".to_string())
            .spawn(move || shared.run_load());
        if let Err(e) = spawned {
            log::error!("failed to start rule loading: {}", e);
        }
    }

    /// Check whether any exception rule matches the URL.
    ///
    /// Note: this scans regardless of the
    /// [`is_with_exception`](FilterEngine::is_with_exception) toggle.
    /// The toggle is advisory state for the caller's combined decision,
    /// it does not short-circuit this check.
    pub fn matches_exception(&self, url: &str) -> bool {
        self.shared
            .matches(url, &self.shared.exception_cache, RuleStore::matches_exception)
    }

    /// Check whether any exclusion rule matches the URL.
    pub fn matches_exclusion(&self, url: &str) -> bool {
        self.shared
            .matches(url, &self.shared.exclusion_cache, RuleStore::matches_exclusion)
    }

    /// Whether the caller should honor exception rules.
    ///
    /// Advisory: the engine keeps answering
    /// [`matches_exception`](FilterEngine::matches_exception) either way,
    /// the caller decides whether to consult it.
    pub fn is_with_exception(&self) -> bool {
        self.shared.with_exception.load(Ordering::Relaxed)
    }

    /// Set the advisory exception toggle.
    pub fn set_with_exception(&self, with_exception: bool) {
        self.shared
            .with_exception
            .store(with_exception, Ordering::Relaxed);
    }

    /// Total number of rules in the active store.
    pub fn rule_count(&self) -> usize {
        self.shared.store.load().rule_count()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.shared.state.lock()
    }

    /// Block until the engine reaches `Ready` or the timeout elapses.
    ///
    /// Returns whether the engine is ready. Queries never need this; it
    /// exists for hosts and tests that want the load pipeline settled.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while *state != EngineState::Ready {
            if self
                .shared
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return *state == EngineState::Ready;
            }
        }
        true
    }

    /// A point-in-time copy of the statistics counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Drop all cached verdicts.
    ///
    /// A store refresh does not clear the caches (staleness is tolerated
    /// by design); hosts wanting stronger freshness call this after
    /// waiting for a refresh.
    pub fn clear_caches(&self) {
        self.shared.exception_cache.clear();
        self.shared.exclusion_cache.clear();
    }

    /// The engine configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.shared.config
    }
}

impl Drop for FilterEngine {
    /// Stop the reporter and flush both verdict caches to disk, so cache
    /// warm-up survives restarts.
    fn drop(&mut self) {
        if let Some(mut reporter) = self.reporter.take() {
            reporter.stop();
        }
        self.shared.flush_caches();
    }
}

impl EngineShared {
    /// The shared query path: cache first, scan on miss, count everything.
    fn matches(&self, url: &str, cache: &UrlCache, scan: fn(&RuleStore, &str) -> bool) -> bool {
        let timer = Instant::now();
        self.stats.record_request();

        let normalized = normalize_url(url);
        let verdict = match cache.get(&normalized) {
            Some(verdict) => {
                self.stats.record_cache_hit();
                verdict
            }
            None => {
                let store = self.store.load();
                let verdict = scan(&store, &normalized);
                cache.put(&normalized, verdict);
                verdict
            }
        };

        if verdict {
            self.stats.record_filter_hit();
        }
        self.stats.record_scan_nanos(timer.elapsed().as_nanos() as u64);
        verdict
    }

    /// The background load pipeline.
    fn run_load(&self) {
        let start = Instant::now();
        self.set_state(EngineState::LoadingSnapshot);
        let local = self.snapshot.load();
        let local_incomplete = local.exception_count() == 0 || local.exclusion_count() == 0;
        let local_count = local.rule_count();
        self.publish(local);
        log::info!(
            "loaded {} local rules (in {}ms)",
            local_count,
            start.elapsed().as_millis()
        );

        self.set_state(EngineState::LoadingCaches);
        let start = Instant::now();
        let restored = self.exception_cache.load(&self.config.cache_dir)
            + self.exclusion_cache.load(&self.config.cache_dir);
        log::info!(
            "loaded {} URLs from cache (in {}ms)",
            restored,
            start.elapsed().as_millis()
        );

        if self.snapshot.is_stale(self.config.refresh_threshold()) || local_incomplete {
            self.set_state(EngineState::Refreshing);
            self.refresh();
        }

        self.set_state(EngineState::Ready);
    }

    /// Fetch every source in order, merging and publishing after each
    /// success; persist the final state.
    ///
    /// A failed endpoint is skipped: rules already published from
    /// earlier endpoints stay active and later endpoints still run.
    fn refresh(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        let mut scratch = RuleStore::new();

        for source in &sources {
            match source.fetch() {
                Ok(fetched) => {
                    scratch.add_all(&fetched);
                    self.publish(scratch.clone());
                    log::info!("{} rules active after {}", scratch.rule_count(), source.name());
                }
                Err(e) => {
                    log::error!("loading {}: {}", source.name(), e);
                }
            }
        }

        let store = self.store.load();
        if let Err(e) = self.snapshot.save(&store) {
            log::error!("saving rule sets: {}", e);
        }
        self.flush_caches();
    }

    /// Swap in a new active store; concurrent readers keep the store they
    /// already loaded and see the new one on their next query.
    fn publish(&self, store: RuleStore) {
        self.store.store(Arc::new(store));
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock() = state;
        self.state_changed.notify_all();
    }

    fn flush_caches(&self) {
        if let Err(e) = self.exception_cache.save(&self.config.cache_dir) {
            log::warn!("saving exception cache: {}", e);
        }
        if let Err(e) = self.exclusion_cache.save(&self.config.cache_dir) {
            log::warn!("saving exclusion cache: {}", e);
        }
    }
}
