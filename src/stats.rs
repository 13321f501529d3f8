//! # Statistics Module
//!
//! Collects counters about the crawler's operation.
//!
//! ## Overview
//!
//! The `StatCollector` is shared by the engine, the transport and the
//! built-in `Metrics` and `RobotsTxt` processors. All counters are atomics or
//! concurrent maps, so every dispatched request updates them without
//! coordination.
//!
//! ## Key Metrics Tracked
//!
//! - **Request Metrics**: submitted, sent (transport attempts), succeeded,
//!   failed, retried and dropped (cancelled by a processor), plus a
//!   per-method request counter
//! - **Response Metrics**: received, served from cache, bytes, status codes
//!   and a per-method response counter
//! - **Robots Metrics**: robots.txt fetches, their statuses, forbidden requests
//! - **Fault Metrics**: callback panics and callback errors
//! - **Item Metrics**: items handed to the exporters
//!
//! ## Example
//!
//! ```rust,ignore
//! let stats = crawler.stats();
//! println!("{}", stats.to_json_string_pretty()?);
//! println!("{}", stats.to_markdown_string());
//! ```

use crate::error::SpiderError;
use dashmap::DashMap;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

// A consistent copy of the counters, used for every presentation format.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub requests_enqueued: usize,
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub requests_dropped: usize,
    pub responses_received: usize,
    pub responses_from_cache: usize,
    pub total_bytes_downloaded: usize,
    pub items_exported: usize,
    pub callback_errors: usize,
    pub panics: usize,
    pub robots_requests: usize,
    pub robots_forbidden: usize,
    pub requests_by_method: BTreeMap<String, usize>,
    pub responses_by_method: BTreeMap<String, usize>,
    pub response_status_counts: BTreeMap<u16, usize>,
    pub robots_status_counts: BTreeMap<u16, usize>,
    pub robots_forbidden_by_method: BTreeMap<String, usize>,
    #[serde(skip)]
    pub elapsed_duration: Duration,
}

impl StatsSnapshot {
    fn formatted_duration(&self) -> String {
        format!("{:?}", self.elapsed_duration)
    }

    fn requests_per_second(&self) -> f64 {
        let total_seconds = self.elapsed_duration.as_secs_f64();
        if total_seconds > 0.0 {
            self.requests_sent as f64 / total_seconds
        } else {
            0.0
        }
    }

    fn formatted_bytes(&self) -> String {
        const KB: usize = 1024;
        const MB: usize = 1024 * KB;
        const GB: usize = 1024 * MB;

        if self.total_bytes_downloaded >= GB {
            format!("{:.2} GB", self.total_bytes_downloaded as f64 / GB as f64)
        } else if self.total_bytes_downloaded >= MB {
            format!("{:.2} MB", self.total_bytes_downloaded as f64 / MB as f64)
        } else if self.total_bytes_downloaded >= KB {
            format!("{:.2} KB", self.total_bytes_downloaded as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes_downloaded)
        }
    }
}

fn collect<K: Clone + Ord, V: Copy>(map: &DashMap<K, V>) -> BTreeMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    map.iter()
        .map(|entry| (entry.key().clone(), *entry.value()))
        .collect()
}

fn bump<K: std::hash::Hash + Eq>(map: &DashMap<K, usize>, key: K) {
    *map.entry(key).or_insert(0) += 1;
}

/// Collects and stores various statistics about the crawler's operation.
#[derive(Debug)]
pub struct StatCollector {
    pub start_time: Instant,

    pub requests_enqueued: AtomicUsize,
    pub requests_sent: AtomicUsize,
    pub requests_succeeded: AtomicUsize,
    pub requests_failed: AtomicUsize,
    pub requests_retried: AtomicUsize,
    pub requests_dropped: AtomicUsize,

    pub responses_received: AtomicUsize,
    pub responses_from_cache: AtomicUsize,
    pub total_bytes_downloaded: AtomicUsize,

    pub items_exported: AtomicUsize,
    pub callback_errors: AtomicUsize,
    pub panics: AtomicUsize,

    pub robots_requests: AtomicUsize,
    pub robots_forbidden: AtomicUsize,

    requests_by_method: DashMap<String, usize>,
    responses_by_method: DashMap<String, usize>,
    response_status_counts: DashMap<u16, usize>,
    robots_status_counts: DashMap<u16, usize>,
    robots_forbidden_by_method: DashMap<String, usize>,
}

impl StatCollector {
    /// Creates a new `StatCollector` with all counters initialized to zero.
    pub fn new() -> Self {
        StatCollector {
            start_time: Instant::now(),
            requests_enqueued: AtomicUsize::new(0),
            requests_sent: AtomicUsize::new(0),
            requests_succeeded: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            requests_retried: AtomicUsize::new(0),
            requests_dropped: AtomicUsize::new(0),
            responses_received: AtomicUsize::new(0),
            responses_from_cache: AtomicUsize::new(0),
            total_bytes_downloaded: AtomicUsize::new(0),
            items_exported: AtomicUsize::new(0),
            callback_errors: AtomicUsize::new(0),
            panics: AtomicUsize::new(0),
            robots_requests: AtomicUsize::new(0),
            robots_forbidden: AtomicUsize::new(0),
            requests_by_method: DashMap::new(),
            responses_by_method: DashMap::new(),
            response_status_counts: DashMap::new(),
            robots_status_counts: DashMap::new(),
            robots_forbidden_by_method: DashMap::new(),
        }
    }

    /// Creates a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_enqueued: self.requests_enqueued.load(Ordering::SeqCst),
            requests_sent: self.requests_sent.load(Ordering::SeqCst),
            requests_succeeded: self.requests_succeeded.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            requests_retried: self.requests_retried.load(Ordering::SeqCst),
            requests_dropped: self.requests_dropped.load(Ordering::SeqCst),
            responses_received: self.responses_received.load(Ordering::SeqCst),
            responses_from_cache: self.responses_from_cache.load(Ordering::SeqCst),
            total_bytes_downloaded: self.total_bytes_downloaded.load(Ordering::SeqCst),
            items_exported: self.items_exported.load(Ordering::SeqCst),
            callback_errors: self.callback_errors.load(Ordering::SeqCst),
            panics: self.panics.load(Ordering::SeqCst),
            robots_requests: self.robots_requests.load(Ordering::SeqCst),
            robots_forbidden: self.robots_forbidden.load(Ordering::SeqCst),
            requests_by_method: collect(&self.requests_by_method),
            responses_by_method: collect(&self.responses_by_method),
            response_status_counts: collect(&self.response_status_counts),
            robots_status_counts: collect(&self.robots_status_counts),
            robots_forbidden_by_method: collect(&self.robots_forbidden_by_method),
            elapsed_duration: self.start_time.elapsed(),
        }
    }

    pub(crate) fn increment_requests_enqueued(&self) {
        self.requests_enqueued.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_succeeded(&self) {
        self.requests_succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_retried(&self) {
        self.requests_retried.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_dropped(&self) {
        self.requests_dropped.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_responses_from_cache(&self) {
        self.responses_from_cache.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn add_bytes_downloaded(&self, bytes: usize) {
        self.total_bytes_downloaded.fetch_add(bytes, Ordering::SeqCst);
    }

    pub(crate) fn increment_items_exported(&self) {
        self.items_exported.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_callback_errors(&self) {
        self.callback_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_panics(&self) {
        self.panics.fetch_add(1, Ordering::SeqCst);
    }

    /// Counts a request that passed the request pipeline, labeled by method.
    pub(crate) fn record_request(&self, method: &str) {
        bump(&self.requests_by_method, method.to_string());
    }

    /// Counts a delivered response, labeled by method and status.
    pub(crate) fn record_response(&self, method: &str, status: u16) {
        self.responses_received.fetch_add(1, Ordering::SeqCst);
        bump(&self.responses_by_method, method.to_string());
        bump(&self.response_status_counts, status);
    }

    pub(crate) fn record_robots_request(&self) {
        self.robots_requests.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_robots_response(&self, status: u16) {
        bump(&self.robots_status_counts, status);
    }

    pub(crate) fn record_robots_forbidden(&self, method: &str) {
        self.robots_forbidden.fetch_add(1, Ordering::SeqCst);
        bump(&self.robots_forbidden_by_method, method.to_string());
    }

    /// Requests that passed the pipeline for `method`.
    pub fn requests_for_method(&self, method: &str) -> usize {
        self.requests_by_method.get(method).map_or(0, |v| *v)
    }

    /// Responses delivered with `status`.
    pub fn responses_with_status(&self, status: u16) -> usize {
        self.response_status_counts.get(&status).map_or(0, |v| *v)
    }

    pub fn to_json_string(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Exports the current statistics to a Markdown formatted string.
    pub fn to_markdown_string(&self) -> String {
        let snapshot = self.snapshot();

        let status_codes_list: String = snapshot
            .response_status_counts
            .iter()
            .map(|(code, count)| format!("- **{}**: {}", code, count))
            .collect::<Vec<String>>()
            .join("\n");
        let status_codes_output = if status_codes_list.is_empty() {
            "N/A".to_string()
        } else {
            status_codes_list
        };

        format!(
            r#"# Crawl Statistics Report

- **Duration**: {}
- **Average Speed**: {:.2} req/s

## Requests
| Metric     | Count |
|------------|-------|
| Enqueued   | {}     |
| Sent       | {}     |
| Succeeded  | {}     |
| Failed     | {}     |
| Retried    | {}     |
| Dropped    | {}     |

## Responses
| Metric     | Count |
|------------|-------|
| Received   | {}     |
| From Cache | {}     |
| Downloaded | {}     |

## Robots.txt
| Metric     | Count |
|------------|-------|
| Fetched    | {}     |
| Forbidden  | {}     |

## Faults
| Metric          | Count |
|-----------------|-------|
| Panics          | {}     |
| Callback errors | {}     |

## Status Codes
{}
"#,
            snapshot.formatted_duration(),
            snapshot.requests_per_second(),
            snapshot.requests_enqueued,
            snapshot.requests_sent,
            snapshot.requests_succeeded,
            snapshot.requests_failed,
            snapshot.requests_retried,
            snapshot.requests_dropped,
            snapshot.responses_received,
            snapshot.responses_from_cache,
            snapshot.formatted_bytes(),
            snapshot.robots_requests,
            snapshot.robots_forbidden,
            snapshot.panics,
            snapshot.callback_errors,
            status_codes_output
        )
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StatCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();

        writeln!(f, "\nCrawl Statistics")?;
        writeln!(f, "----------------")?;
        writeln!(f, "  duration : {}", snapshot.formatted_duration())?;
        writeln!(f, "  speed    : req/s: {:.2}", snapshot.requests_per_second())?;
        writeln!(
            f,
            "  requests : enqueued: {}, sent: {}, ok: {}, fail: {}, retry: {}, drop: {}",
            snapshot.requests_enqueued,
            snapshot.requests_sent,
            snapshot.requests_succeeded,
            snapshot.requests_failed,
            snapshot.requests_retried,
            snapshot.requests_dropped
        )?;
        writeln!(
            f,
            "  response : received: {}, from_cache: {}, downloaded: {}",
            snapshot.responses_received,
            snapshot.responses_from_cache,
            snapshot.formatted_bytes()
        )?;
        writeln!(
            f,
            "  robots   : fetched: {}, forbidden: {}",
            snapshot.robots_requests, snapshot.robots_forbidden
        )?;
        writeln!(
            f,
            "  faults   : panics: {}, callback errors: {}",
            snapshot.panics, snapshot.callback_errors
        )?;
        writeln!(f, "  items    : exported: {}", snapshot.items_exported)?;

        let status_string = if snapshot.response_status_counts.is_empty() {
            "none".to_string()
        } else {
            snapshot
                .response_status_counts
                .iter()
                .map(|(code, count)| format!("{}: {}", code, count))
                .collect::<Vec<String>>()
                .join(", ")
        };

        writeln!(f, "  status   : {}\n", status_string)
    }
}
