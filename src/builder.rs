//! # Builder Module
//!
//! Provides the `CrawlerBuilder`, a fluent API for constructing and configuring
//! `Crawler` instances, and `CrawlerConfig`, the plain settings it validates.
//!
//! ## Overview
//!
//! The builder assembles the engine: it creates the `StatCollector`, the
//! limiter, the transport (HTTP downloader, optional renderer, optional
//! cache and retry policy), the robots cache, and the processor chains in
//! their fixed order with the caller's processors appended.
//!
//! ## Key Features
//!
//! - **Politeness**: allowed domains, global and per-domain concurrency,
//!   requests per second, fixed or randomized delay, robots.txt
//! - **Transport**: retries and retry statuses, redirects, body cap,
//!   timeout, cookies, user agent, response cache, renderer
//! - **Component Registration**: custom request/response processors,
//!   exporters and downloader
//! - **Validation**: inconsistent settings fail `build()` with
//!   `SpiderError::ConfigurationError`
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::prelude::*;
//! use std::time::Duration;
//!
//! async fn crawl() -> Result<(), SpiderError> {
//!     let crawler = CrawlerBuilder::new(MySpider)
//!         .allowed_domains(["quotes.toscrape.com"])
//!         .concurrent_requests(8)
//!         .concurrent_requests_per_domain(2)
//!         .request_delay(Duration::from_millis(250), true)
//!         .add_exporter(JsonLinesExporter::new("quotes.jl"))
//!         .build()?;
//!
//!     crawler.run().await
//! }
//! ```

use crate::cache::HttpCache;
use crate::concurrency::Limiter;
use crate::crawler::{Crawler, CrawlerInner, LaneJob, MiddlewareManager};
use crate::dedup::VisitedSet;
use crate::downloader::{
    Downloader, Renderer, ReqwestClientDownloader, RetryPolicy, Transport, DEFAULT_MAX_BODY_SIZE,
    DEFAULT_MAX_REDIRECTS, DEFAULT_RETRY_STATUS_CODES, DEFAULT_RETRY_TIMES, DEFAULT_TIMEOUT,
};
use crate::error::SpiderError;
use crate::exporter::{ExportChannels, Exporter};
use crate::middleware::{
    AllowedDomains, Delay, DuplicateRequests, Headers, LogStats, Metrics, ParseDocument,
    RequestProcessor, ResponseProcessor, RobotsTxt, DEFAULT_USER_AGENT,
};
use crate::robots::RobotsCache;
use crate::spider::Spider;
use crate::state::CrawlerState;
use crate::stats::StatCollector;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Settings of a crawl. `0` disables a limit where noted.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Hosts (`name` or `name:port`) requests may go to. Empty allows all.
    pub allowed_domains: Vec<String>,
    /// Global in-flight cap; `0` is unbounded.
    pub concurrent_requests: usize,
    /// Per-host in-flight cap; `0` is unbounded.
    pub concurrent_requests_per_domain: usize,
    /// Global request rate; `0.0` is unlimited.
    pub requests_per_second: f64,
    pub request_delay: Duration,
    /// Draw each delay from `[0.5, 1.5] * request_delay`.
    pub request_delay_randomize: bool,
    pub retry_times: usize,
    pub retry_status_codes: Vec<u16>,
    /// `0` disables redirect following.
    pub max_redirects: usize,
    pub max_body_size: usize,
    pub user_agent: String,
    /// Fetch the same GET URL more than once.
    pub url_revisit_enabled: bool,
    pub robots_txt_disabled: bool,
    pub parse_html_disabled: bool,
    pub timeout: Duration,
    pub cookies_disabled: bool,
    /// Suppress the per-response `Crawled:` log line.
    pub log_disabled: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        CrawlerConfig {
            allowed_domains: Vec::new(),
            concurrent_requests: 0,
            concurrent_requests_per_domain: 0,
            requests_per_second: 0.0,
            request_delay: Duration::ZERO,
            request_delay_randomize: false,
            retry_times: DEFAULT_RETRY_TIMES,
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            url_revisit_enabled: false,
            robots_txt_disabled: false,
            parse_html_disabled: false,
            timeout: DEFAULT_TIMEOUT,
            cookies_disabled: false,
            log_disabled: false,
        }
    }
}

impl CrawlerConfig {
    /// Checks the settings for values the engine cannot honor.
    pub fn validate(&self) -> Result<(), SpiderError> {
        if !self.requests_per_second.is_finite() || self.requests_per_second < 0.0 {
            return Err(SpiderError::ConfigurationError(format!(
                "requests_per_second must be a non-negative number, got {}.",
                self.requests_per_second
            )));
        }
        if let Some(code) = self
            .retry_status_codes
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(SpiderError::ConfigurationError(format!(
                "retry status code {code} is not an HTTP status."
            )));
        }
        if self.max_body_size == 0 {
            return Err(SpiderError::ConfigurationError(
                "max_body_size must be greater than 0.".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(SpiderError::ConfigurationError(
                "timeout must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Assembles a `Crawler`.
pub struct CrawlerBuilder {
    crawler_config: CrawlerConfig,
    spider: Arc<dyn Spider>,
    downloader: Option<Arc<dyn Downloader>>,
    renderer: Option<Arc<dyn Renderer>>,
    cache: Option<Arc<dyn HttpCache>>,
    request_processors: Vec<Arc<dyn RequestProcessor>>,
    response_processors: Vec<Arc<dyn ResponseProcessor>>,
    exporters: Vec<Arc<dyn Exporter>>,
}

impl CrawlerBuilder {
    /// Creates a new `CrawlerBuilder` for a given spider with default settings.
    pub fn new<S: Spider>(spider: S) -> Self {
        Self {
            crawler_config: CrawlerConfig::default(),
            spider: Arc::new(spider),
            downloader: None,
            renderer: None,
            cache: None,
            request_processors: Vec::new(),
            response_processors: Vec::new(),
            exporters: Vec::new(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: CrawlerConfig) -> Self {
        self.crawler_config = config;
        self
    }

    pub fn allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.crawler_config.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the global in-flight cap. `0` removes it.
    pub fn concurrent_requests(mut self, limit: usize) -> Self {
        self.crawler_config.concurrent_requests = limit;
        self
    }

    /// Sets the per-host in-flight cap. `0` removes it.
    pub fn concurrent_requests_per_domain(mut self, limit: usize) -> Self {
        self.crawler_config.concurrent_requests_per_domain = limit;
        self
    }

    pub fn requests_per_second(mut self, rate: f64) -> Self {
        self.crawler_config.requests_per_second = rate;
        self
    }

    pub fn request_delay(mut self, delay: Duration, randomize: bool) -> Self {
        self.crawler_config.request_delay = delay;
        self.crawler_config.request_delay_randomize = randomize;
        self
    }

    pub fn retry_times(mut self, times: usize) -> Self {
        self.crawler_config.retry_times = times;
        self
    }

    pub fn retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.crawler_config.retry_status_codes = codes.into_iter().collect();
        self
    }

    pub fn max_redirects(mut self, redirects: usize) -> Self {
        self.crawler_config.max_redirects = redirects;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.crawler_config.max_body_size = bytes;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.crawler_config.user_agent = user_agent.into();
        self
    }

    pub fn url_revisit_enabled(mut self, enabled: bool) -> Self {
        self.crawler_config.url_revisit_enabled = enabled;
        self
    }

    pub fn robots_txt_disabled(mut self, disabled: bool) -> Self {
        self.crawler_config.robots_txt_disabled = disabled;
        self
    }

    pub fn parse_html_disabled(mut self, disabled: bool) -> Self {
        self.crawler_config.parse_html_disabled = disabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.crawler_config.timeout = timeout;
        self
    }

    pub fn cookies_disabled(mut self, disabled: bool) -> Self {
        self.crawler_config.cookies_disabled = disabled;
        self
    }

    pub fn log_disabled(mut self, disabled: bool) -> Self {
        self.crawler_config.log_disabled = disabled;
        self
    }

    /// Sets a custom HTTP downloader. Timeout, redirect, cookie and body
    /// size settings only apply to the default one.
    pub fn downloader<D: Downloader>(mut self, downloader: D) -> Self {
        self.downloader = Some(Arc::new(downloader));
        self
    }

    /// Sets the backend used for rendered requests.
    pub fn renderer<R: Renderer>(mut self, renderer: R) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Enables a response cache for GET requests.
    pub fn cache<C: HttpCache>(mut self, cache: C) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Appends a request processor after the built-in ones.
    pub fn add_request_processor<P: RequestProcessor>(mut self, processor: P) -> Self {
        self.request_processors.push(Arc::new(processor));
        self
    }

    /// Appends a response processor after the built-in ones.
    pub fn add_response_processor<P: ResponseProcessor>(mut self, processor: P) -> Self {
        self.response_processors.push(Arc::new(processor));
        self
    }

    pub fn add_exporter<E: Exporter>(mut self, exporter: E) -> Self {
        self.exporters.push(Arc::new(exporter));
        self
    }

    /// Builds the `Crawler`, wiring every component to one `StatCollector`.
    pub fn build(self) -> Result<Crawler, SpiderError> {
        let config = self.crawler_config;
        config.validate()?;
        let headers = Headers::new(&config.user_agent)?;

        let stats = Arc::new(StatCollector::new());

        let downloader: Arc<dyn Downloader> = match self.downloader {
            Some(downloader) => downloader,
            None => Arc::new(ReqwestClientDownloader::new(
                config.timeout,
                config.max_redirects,
                config.max_body_size,
                !config.cookies_disabled,
            )?),
        };
        let transport = Transport::new(
            Arc::clone(&downloader),
            self.renderer,
            self.cache,
            RetryPolicy::new(config.retry_times, config.retry_status_codes.iter().copied()),
            Arc::clone(&stats),
        );

        let duplicates = Arc::new(DuplicateRequests::new(
            Arc::new(VisitedSet::new()),
            config.url_revisit_enabled,
        ));
        let metrics = Arc::new(Metrics::new(Arc::clone(&stats)));

        let mut request_processors: Vec<Arc<dyn RequestProcessor>> = vec![
            Arc::new(AllowedDomains::new(config.allowed_domains.iter().cloned())),
            duplicates.clone(),
            Arc::new(headers),
            Arc::new(Delay::new(config.request_delay, config.request_delay_randomize)),
        ];
        if !config.robots_txt_disabled {
            let robots = RobotsCache::new(
                Arc::clone(&downloader),
                config.user_agent.clone(),
                Arc::clone(&stats),
            );
            request_processors.push(Arc::new(RobotsTxt::new(Arc::new(robots), Arc::clone(&stats))));
        }
        request_processors.push(metrics.clone());
        request_processors.extend(self.request_processors);

        let mut response_processors: Vec<Arc<dyn ResponseProcessor>> = Vec::new();
        if !config.parse_html_disabled {
            response_processors.push(Arc::new(ParseDocument));
        }
        if !config.log_disabled {
            response_processors.push(Arc::new(LogStats));
        }
        response_processors.push(metrics);
        response_processors.extend(self.response_processors);

        let middlewares = MiddlewareManager::new(request_processors, response_processors);
        debug!(
            "Request processors: {:?}; response processors: {:?}",
            middlewares.request_processor_names(),
            middlewares.response_processor_names()
        );

        let limiter = Limiter::new(
            config.concurrent_requests,
            config.concurrent_requests_per_domain,
            config.requests_per_second,
        );
        let (lane_tx, lane_rx) = kanal::unbounded_async::<LaneJob>();

        Ok(Crawler::new(CrawlerInner {
            config,
            spider: self.spider,
            limiter,
            middlewares,
            transport,
            duplicates,
            state: CrawlerState::new(),
            stats,
            exports: ExportChannels::new(self.exporters),
            lane_tx,
            lane_rx: Mutex::new(Some(lane_rx)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    struct NoopSpider;

    impl Spider for NoopSpider {
        fn parse(&self, _crawler: &Crawler, _response: Response) -> Result<(), SpiderError> {
            Ok(())
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = CrawlerConfig::default();
        assert_eq!(config.retry_times, 2);
        assert_eq!(config.retry_status_codes, vec![500, 502, 503, 504, 522, 524, 408]);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.max_body_size, 1024 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(180));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_invalid_rate() {
        for rate in [-1.0, f64::NAN, f64::INFINITY] {
            let result = CrawlerBuilder::new(NoopSpider).requests_per_second(rate).build();
            assert!(matches!(result, Err(SpiderError::ConfigurationError(_))));
        }
    }

    #[test]
    fn rejects_invalid_user_agent_and_status() {
        let result = CrawlerBuilder::new(NoopSpider).user_agent("bad\r\nagent").build();
        assert!(matches!(result, Err(SpiderError::ConfigurationError(_))));

        let result = CrawlerBuilder::new(NoopSpider).retry_status_codes([503, 1000]).build();
        assert!(matches!(result, Err(SpiderError::ConfigurationError(_))));
    }

    #[test]
    fn installs_processors_in_order() {
        let crawler = CrawlerBuilder::new(NoopSpider).build().unwrap();
        assert_eq!(
            crawler.inner.middlewares.request_processor_names(),
            vec!["AllowedDomains", "DuplicateRequests", "Headers", "Delay", "RobotsTxt", "Metrics"]
        );
        assert_eq!(
            crawler.inner.middlewares.response_processor_names(),
            vec!["ParseDocument", "LogStats", "Metrics"]
        );

        let crawler = CrawlerBuilder::new(NoopSpider)
            .robots_txt_disabled(true)
            .parse_html_disabled(true)
            .log_disabled(true)
            .build()
            .unwrap();
        assert_eq!(
            crawler.inner.middlewares.request_processor_names(),
            vec!["AllowedDomains", "DuplicateRequests", "Headers", "Delay", "Metrics"]
        );
        assert_eq!(crawler.inner.middlewares.response_processor_names(), vec!["Metrics"]);
    }
}
