//! # Downloader Module
//!
//! Turns a `Request` into a `RawResponse`.
//!
//! ## Overview
//!
//! Two seams are exposed as traits: `Downloader` for the plain HTTP path and
//! `Renderer` for requests flagged `rendered` (a headless browser, supplied
//! by the caller). The `Transport` composes them with the optional response
//! cache and the `RetryPolicy`, and is what the engine calls for every
//! request that survived the request pipeline.
//!
//! ## Key Components
//!
//! - **Downloader**: one network attempt over HTTP
//! - **ReqwestClientDownloader**: the default `Downloader`, backed by `reqwest`
//! - **Renderer**: one attempt through a rendering backend
//! - **RetryPolicy**: which outcomes are retried and how many times
//! - **Transport**: cache lookup, attempts with retry, cache store

mod reqwest_client;
mod retry;

pub use reqwest_client::{
    ReqwestClientDownloader, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT,
};
pub use retry::{RetryPolicy, DEFAULT_RETRY_STATUS_CODES, DEFAULT_RETRY_TIMES};

use crate::cache::HttpCache;
use crate::error::SpiderError;
use crate::request::Request;
use crate::response::RawResponse;
use crate::stats::StatCollector;
use async_trait::async_trait;
use log::{debug, trace, warn};
use std::sync::Arc;

/// Performs a single HTTP attempt for a request.
#[async_trait]
pub trait Downloader: Send + Sync + 'static {
    async fn download(&self, request: &Request) -> Result<RawResponse, SpiderError>;
}

/// Fetches a request through a rendering backend (e.g. a headless browser).
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    async fn render(&self, request: &Request) -> Result<RawResponse, SpiderError>;
}

/// The network side of a dispatch: cache, downloader or renderer, retries.
pub struct Transport {
    http: Arc<dyn Downloader>,
    renderer: Option<Arc<dyn Renderer>>,
    cache: Option<Arc<dyn HttpCache>>,
    retry: RetryPolicy,
    stats: Arc<StatCollector>,
}

impl Transport {
    pub fn new(
        http: Arc<dyn Downloader>,
        renderer: Option<Arc<dyn Renderer>>,
        cache: Option<Arc<dyn HttpCache>>,
        retry: RetryPolicy,
        stats: Arc<StatCollector>,
    ) -> Self {
        Self {
            http,
            renderer,
            cache,
            retry,
            stats,
        }
    }

    /// Fetches `request`, retrying as the policy allows.
    ///
    /// The request's retry counter is shared by error and status retries, so
    /// at most `retry_times + 1` attempts are made. A response whose status
    /// is still retryable after the last attempt becomes `HttpStatus`.
    pub async fn fetch(&self, request: &mut Request) -> Result<RawResponse, SpiderError> {
        if let Some(cached) = self.cache_lookup(request) {
            trace!("Cache hit for {}", request.url);
            self.stats.increment_responses_from_cache();
            return Ok(cached);
        }

        let outcome = loop {
            self.stats.increment_requests_sent();
            let outcome = self.attempt(request).await;

            if !self.retry.should_retry(&outcome, request.retry_count()) {
                break outcome;
            }
            request.increment_retry();
            self.stats.increment_requests_retried();
            match &outcome {
                Ok(raw) => debug!(
                    "Retrying {} (status {}), retry {}/{}",
                    request.url,
                    raw.status,
                    request.retry_count(),
                    self.retry.retry_times
                ),
                Err(e) => debug!(
                    "Retrying {} ({}), retry {}/{}",
                    request.url,
                    e,
                    request.retry_count(),
                    self.retry.retry_times
                ),
            }
        };

        let raw = outcome?;
        if self.retry.is_retry_status(raw.status) {
            warn!(
                "Giving up on {} after {} attempts, last status {}",
                request.url,
                request.retry_count() + 1,
                raw.status
            );
            return Err(SpiderError::HttpStatus {
                url: request.url.to_string(),
                status: raw.status,
                attempts: request.retry_count() + 1,
            });
        }

        if let Some(cache) = &self.cache {
            if request.method == reqwest::Method::GET {
                cache.store(request, &raw);
            }
        }
        Ok(raw)
    }

    fn cache_lookup(&self, request: &Request) -> Option<RawResponse> {
        if request.method != reqwest::Method::GET {
            return None;
        }
        let mut raw = self.cache.as_ref()?.lookup(request)?;
        raw.cached = true;
        Some(raw)
    }

    async fn attempt(&self, request: &Request) -> Result<RawResponse, SpiderError> {
        if request.rendered {
            return match &self.renderer {
                Some(renderer) => renderer.render(request).await,
                None => Err(SpiderError::RendererUnavailable(request.url.to_string())),
            };
        }
        self.http.download(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every attempt with a fixed status and counts attempts.
    struct FixedStatus {
        status: StatusCode,
        attempts: AtomicUsize,
    }

    impl FixedStatus {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status: StatusCode::from_u16(status).unwrap(),
                attempts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Downloader for FixedStatus {
        async fn download(&self, request: &Request) -> Result<RawResponse, SpiderError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(RawResponse::new(self.status, request.url.clone(), "body"))
        }
    }

    /// Fails the first `failures` attempts with an I/O error.
    struct Flaky {
        failures: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Downloader for Flaky {
        async fn download(&self, request: &Request) -> Result<RawResponse, SpiderError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into());
            }
            Ok(RawResponse::new(StatusCode::OK, request.url.clone(), "ok"))
        }
    }

    fn transport(http: Arc<dyn Downloader>, cache: Option<Arc<dyn HttpCache>>) -> (Transport, Arc<StatCollector>) {
        let stats = Arc::new(StatCollector::new());
        let transport = Transport::new(http, None, cache, RetryPolicy::default(), Arc::clone(&stats));
        (transport, stats)
    }

    #[tokio::test]
    async fn always_503_makes_three_attempts() {
        let http = FixedStatus::new(503);
        let (transport, stats) = transport(http.clone(), None);
        let mut request = Request::get("https://example.com/").unwrap();

        let err = transport.fetch(&mut request).await.unwrap_err();
        match err {
            SpiderError::HttpStatus { status, attempts, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(http.attempts.load(Ordering::SeqCst), 3);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests_sent, 3);
        assert_eq!(snapshot.requests_retried, 2);
    }

    #[tokio::test]
    async fn transient_errors_recover_within_budget() {
        let http = Arc::new(Flaky {
            failures: 2,
            attempts: AtomicUsize::new(0),
        });
        let (transport, _) = transport(http.clone(), None);
        let mut request = Request::get("https://example.com/").unwrap();

        let raw = transport.fetch(&mut request).await.unwrap();
        assert_eq!(raw.status, StatusCode::OK);
        assert_eq!(request.retry_count(), 2);
    }

    #[tokio::test]
    async fn non_retry_status_is_returned_as_is() {
        let http = FixedStatus::new(404);
        let (transport, _) = transport(http.clone(), None);
        let mut request = Request::get("https://example.com/missing").unwrap();

        let raw = transport.fetch(&mut request).await.unwrap();
        assert_eq!(raw.status, StatusCode::NOT_FOUND);
        assert_eq!(http.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rendered_request_without_renderer_fails() {
        let http = FixedStatus::new(200);
        let (transport, _) = transport(http.clone(), None);
        let mut request = Request::get("https://example.com/").unwrap().rendered();

        let err = transport.fetch(&mut request).await.unwrap_err();
        assert!(matches!(err, SpiderError::RendererUnavailable(_)));
        assert_eq!(http.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let http = FixedStatus::new(200);
        let cache: Arc<dyn HttpCache> = Arc::new(MemoryCache::new(16));
        let (transport, stats) = transport(http.clone(), Some(cache));

        let mut first = Request::get("https://example.com/page").unwrap();
        assert!(!transport.fetch(&mut first).await.unwrap().cached);
        let mut second = Request::get("https://example.com/page").unwrap();
        assert!(transport.fetch(&mut second).await.unwrap().cached);

        assert_eq!(http.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(stats.snapshot().responses_from_cache, 1);
    }
}
