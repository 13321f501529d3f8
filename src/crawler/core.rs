//! The core Crawler implementation.
//!
//! `Crawler` is a cheap-to-clone handle around the engine's shared state:
//! the limiter, the middleware pipeline, the transport, the outstanding-work
//! counter, the stats and the export channels. Every callback receives a
//! reference to it, so callbacks can submit more requests and export items
//! while the crawl is running.
//!
//! `run()` starts the exporters and the sequential lane, submits the spider's
//! start requests and waits until no submitted request is outstanding. It
//! then closes the export channels and waits for every exporter to finish.

use super::middleware_manager::MiddlewareManager;
use super::request_handler::install_panic_hook;
use crate::builder::CrawlerConfig;
use crate::concurrency::Limiter;
use crate::downloader::Transport;
use crate::error::SpiderError;
use crate::exporter::ExportChannels;
use crate::middleware::DuplicateRequests;
use crate::request::Request;
use crate::response::Response;
use crate::spider::Spider;
use crate::state::{CrawlerState, WorkGuard};
use crate::stats::StatCollector;
use futures_util::future::join_all;
use kanal::{AsyncReceiver, AsyncSender};
use parking_lot::Mutex;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Handles one completed response. Requests submitted with `None` use `Spider::parse`.
pub type Callback = Arc<dyn Fn(&Crawler, Response) -> Result<(), SpiderError> + Send + Sync>;

/// Wraps a closure as a request callback.
pub fn callback<F>(f: F) -> Option<Callback>
where
    F: Fn(&Crawler, Response) -> Result<(), SpiderError> + Send + Sync + 'static,
{
    Some(Arc::new(f))
}

/// A request waiting on the sequential lane.
pub(crate) struct LaneJob {
    pub(crate) request: Request,
    pub(crate) callback: Option<Callback>,
    pub(crate) guard: WorkGuard,
}

pub(crate) struct CrawlerInner {
    pub(crate) config: CrawlerConfig,
    pub(crate) spider: Arc<dyn Spider>,
    pub(crate) limiter: Limiter,
    pub(crate) middlewares: MiddlewareManager,
    pub(crate) transport: Transport,
    pub(crate) duplicates: Arc<DuplicateRequests>,
    pub(crate) state: Arc<CrawlerState>,
    pub(crate) stats: Arc<StatCollector>,
    pub(crate) exports: ExportChannels,
    pub(crate) lane_tx: AsyncSender<LaneJob>,
    pub(crate) lane_rx: Mutex<Option<AsyncReceiver<LaneJob>>>,
}

/// The central orchestrator of a crawl.
#[derive(Clone)]
pub struct Crawler {
    pub(crate) inner: Arc<CrawlerInner>,
}

impl Crawler {
    pub(crate) fn new(inner: CrawlerInner) -> Self {
        install_panic_hook();
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Schedules `request`. `callback` handles the response; `None` means
    /// `Spider::parse`.
    ///
    /// The request is counted as outstanding before this returns. Requests
    /// flagged `synchronized` go to the sequential lane and are dispatched
    /// one at a time in submission order; all others get their own task.
    /// After shutdown has begun this does nothing.
    pub fn submit(&self, request: Request, callback: Option<Callback>) {
        if self.inner.state.is_shutting_down() {
            debug!("Shutting down, not scheduling {} {}", request.method, request.url);
            return;
        }

        let guard = self.inner.state.begin_work();
        self.inner.stats.increment_requests_enqueued();

        if request.synchronized {
            let url = request.url.clone();
            let job = LaneJob {
                request,
                callback,
                guard,
            };
            match self.inner.lane_tx.try_send(job) {
                Ok(true) => {}
                Ok(false) | Err(_) => error!("Sequential lane unavailable, dropping {}", url),
            }
            return;
        }

        let crawler = self.clone();
        tokio::spawn(async move {
            crawler.dispatch_guarded(request, callback, guard).await;
        });
    }

    /// Submits a GET request.
    pub fn get(&self, url: &str, callback: Option<Callback>) {
        self.submit_url(Method::GET, url, false, callback);
    }

    /// Submits a GET request fetched through the renderer.
    pub fn get_rendered(&self, url: &str, callback: Option<Callback>) {
        self.submit_url(Method::GET, url, true, callback);
    }

    /// Submits a HEAD request.
    pub fn head(&self, url: &str, callback: Option<Callback>) {
        self.submit_url(Method::HEAD, url, false, callback);
    }

    fn submit_url(&self, method: Method, url: &str, rendered: bool, callback: Option<Callback>) {
        match url::Url::parse(url) {
            Ok(parsed) => {
                let mut request = Request::from_parts(method, parsed);
                request.rendered = rendered;
                self.submit(request, callback);
            }
            Err(e) => error!("Not submitting invalid url '{}': {}", url, e),
        }
    }

    /// Sends an item to every exporter.
    ///
    /// Items exported after the crawl finished are dropped with a warning.
    pub fn export<T: Serialize>(&self, item: T) -> Result<(), SpiderError> {
        if self.inner.exports.send(&item)? {
            self.inner.stats.increment_items_exported();
        } else {
            warn!("Export channels are closed, dropping item");
        }
        Ok(())
    }

    /// Runs the crawl until every submitted request has completed.
    ///
    /// A first Ctrl-C stops accepting new requests and keeps draining the
    /// ones in flight. A second Ctrl-C stops waiting: exporters are closed
    /// and awaited, and `SpiderError::Interrupted` is returned while
    /// in-flight requests are left to finish on their own.
    pub async fn run(&self) -> Result<(), SpiderError> {
        let config = &self.inner.config;
        info!(
            "Crawler starting: concurrent_requests={}, concurrent_requests_per_domain={}, requests_per_second={}, exporters={}",
            config.concurrent_requests,
            config.concurrent_requests_per_domain,
            config.requests_per_second,
            self.inner.exports.len()
        );

        let exporters = self.inner.exports.spawn();
        let lane = self.spawn_sequential_lane();

        self.inner.spider.start_requests(self);

        let state = Arc::clone(&self.inner.state);
        let interrupted = tokio::select! {
            _ = state.wait_idle() => {
                info!("Crawl has become idle, initiating shutdown.");
                false
            }
            _ = wait_for_interrupts(&state) => {
                warn!(
                    "Stopping with {} requests still in flight.",
                    state.outstanding()
                );
                true
            }
        };

        state.begin_shutdown();
        if let Some(lane) = lane {
            lane.abort();
        }

        info!("Closing exporters...");
        self.inner.exports.close();
        for result in join_all(exporters).await {
            if let Err(e) = result {
                error!("Exporter task failed: {}", e);
            }
        }
        debug!("All exporters finished");

        let stats = self.inner.stats.snapshot();
        info!(
            "Crawl finished. Stats: requests_enqueued={}, requests_succeeded={}, requests_failed={}, items_exported={}",
            stats.requests_enqueued,
            stats.requests_succeeded,
            stats.requests_failed,
            stats.items_exported
        );

        if interrupted {
            Err(SpiderError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Returns the `StatCollector` shared by every component of this crawler.
    pub fn stats(&self) -> Arc<StatCollector> {
        Arc::clone(&self.inner.stats)
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.inner.config
    }

    /// Requests submitted but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.inner.state.outstanding()
    }

    /// Whether the crawler has stopped accepting new requests.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.is_shutting_down()
    }
}

/// Resolves on the second Ctrl-C. The first one only begins shutdown.
async fn wait_for_interrupts(state: &CrawlerState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, finishing in-flight requests. Press Ctrl-C again to stop now.");
    state.begin_shutdown();

    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    warn!("Second Ctrl-C received, forcing shutdown.");
}
