//! EasyFilter - an EasyList-style URL filtering engine.
//!
//! This crate decides, for a given URL, whether an ad-blocking rule
//! matches it. Rules come from EasyList-format subscription lists and
//! fall into two sets: exclusions ("block this") and exceptions ("allow
//! this even though an exclusion matches").
//!
//! # Features
//!
//! - **EasyList wildcard syntax**: `*`, `^` separator, `||` domain
//!   anchor, `|` start/end anchors, `@@` exception marker
//! - **Two-set matching**: independent exception and exclusion checks
//! - **Bounded verdict caches**: repeated URLs skip the rule scan
//! - **Non-blocking startup**: queries are answered from the first call,
//!   rules stream in from a background thread
//! - **Persistent state**: rule snapshot and warmed caches survive
//!   restarts, with a checksum guarding the snapshot files
//! - **Thread-safe**: share one engine behind an `Arc`, query from
//!   anywhere
//!
//! # Quick Start
//!
//! ```ignore
//! use easyfilter::{FilterConfig, FilterEngine};
//!
//! let config = FilterConfig::default()
//!     .with_cache_dir("/tmp/easyfilter");
//! let engine = FilterEngine::new(config);
//!
//! // Kick off the background pipeline: local snapshot first, then a
//! // remote refresh if the snapshot is stale or incomplete.
//! engine.load();
//!
//! // Decide whether to block a request. The exception check is the
//! // caller's choice; `is_with_exception()` carries that preference.
//! let url = "http://ads.doubleclick.net/banner";
//! let block = engine.matches_exclusion(url)
//!     && !(engine.is_with_exception() && engine.matches_exception(url));
//! ```
//!
//! # Rule Syntax
//!
//! A rule is one line of an EasyList file:
//!
//! - `&ad_box_`: substring match anywhere in the URL
//! - `||ads.example.com^`: match the domain and its subdomains
//! - `|http://example.com/ad|`: anchor to the start/end of the URL
//! - `@@||example.com/ads.js`: exception, allow despite exclusions
//! - `! comment` and `[Adblock Plus 2.0]` headers are ignored, as are
//!   element-hiding lines (`##`, `#@#`, `#?#`) which have no URL to match
//!
//! Scheme and host compare case-insensitively; the path keeps its case.
//!
//! # Load Pipeline
//!
//! [`FilterEngine::load`] returns immediately and works in the
//! background:
//!
//! 1. Restore the persisted rule snapshot and publish it
//! 2. Restore the persisted verdict caches
//! 3. If the snapshot is older than the refresh threshold (default one
//!    day) or either rule set is empty, fetch the configured endpoints
//!    in order, publishing the merged store after each one
//! 4. Persist the refreshed snapshot and caches
//!
//! A failed endpoint is logged and skipped; rules from the other
//! endpoints still apply. Queries made before (or during) the pipeline
//! see whatever store is currently published, at worst the empty one,
//! which answers `false`.

mod error;
mod metadata;

pub mod cache;
pub mod config;
pub mod engine;
pub mod rule;
pub mod snapshot;
pub mod source;
pub mod stats;
pub mod store;

// Re-export core types
pub use error::{Error, Result};
pub use rule::{normalize_url, Rule, RuleKind, RulePattern};

// Re-export the engine façade
pub use config::FilterConfig;
pub use engine::{EngineState, FilterEngine};

// Re-export rule storage and caching
pub use cache::UrlCache;
pub use store::RuleStore;

// Re-export rule sources
pub use source::{parse_rules, HttpSource, RuleSource};

// Re-export persistence
pub use metadata::UpdateMetadata;
pub use snapshot::Snapshot;

// Re-export statistics
pub use stats::{FilterStats, StatsReporter, StatsSnapshot};
