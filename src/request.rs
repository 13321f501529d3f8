//! The unit of work submitted to the crawler.
//!
//! A `Request` is owned by the task dispatching it. Request processors may
//! mutate it (add headers, toggle rendering) or cancel it; once the transport
//! has started, the request is only read.

use crate::error::SpiderError;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

/// An HTTP request with crawl metadata.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Arbitrary data carried from the submitter to the response callback.
    pub meta: HashMap<String, Value>,
    /// Fetch through the rendering backend instead of the plain HTTP client.
    pub rendered: bool,
    /// Dispatch on the crawler's sequential lane instead of a new task.
    pub synchronized: bool,
    cancelled: bool,
    retry_count: usize,
}

impl Request {
    /// Creates a request from a method name and a URL string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMethod` or `InvalidUrl` when either part is malformed.
    pub fn new(method: &str, url: &str) -> Result<Self, SpiderError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| SpiderError::InvalidMethod(method.to_string()))?;
        let url = Url::parse(url).map_err(|source| SpiderError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self::from_parts(method, url))
    }

    /// Creates a GET request.
    pub fn get(url: &str) -> Result<Self, SpiderError> {
        Self::new("GET", url)
    }

    /// Creates a request from an already parsed method and URL.
    pub fn from_parts(method: Method, mut url: Url) -> Self {
        url.set_fragment(None);
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            meta: HashMap::new(),
            rendered: false,
            synchronized: false,
            cancelled: false,
            retry_count: 0,
        }
    }

    /// Sets a header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the name or value is not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, SpiderError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SpiderError::ConfigurationError(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| SpiderError::ConfigurationError(format!("header value '{value}': {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn rendered(mut self) -> Self {
        self.rendered = true;
        self
    }

    pub fn synchronized(mut self) -> Self {
        self.synchronized = true;
        self
    }

    /// Marks the request as cancelled. Only meaningful inside request processors.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Number of retries already spent on this request.
    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    pub(crate) fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Host name plus explicit port, e.g. `example.com` or `127.0.0.1:8080`.
    ///
    /// Used to key the per-host limiter and the robots cache.
    pub fn host_key(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// The de-duplication key: method plus normalized URL.
    pub fn fingerprint(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// The `User-Agent` header, if one has been set.
    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let err = Request::get("not a url").unwrap_err();
        assert!(matches!(err, SpiderError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_malformed_method() {
        let err = Request::new("GE T", "https://example.com").unwrap_err();
        assert!(matches!(err, SpiderError::InvalidMethod(_)));
    }

    #[test]
    fn strips_fragment_from_fingerprint() {
        let a = Request::get("https://example.com/page#top").unwrap();
        let b = Request::get("https://example.com/page").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), "GET https://example.com/page");
    }

    #[test]
    fn host_key_keeps_explicit_port() {
        let req = Request::get("http://127.0.0.1:8080/a").unwrap();
        assert_eq!(req.host_key(), "127.0.0.1:8080");
        let req = Request::get("https://example.com/a").unwrap();
        assert_eq!(req.host_key(), "example.com");
    }

    #[test]
    fn cancel_sets_flag() {
        let mut req = Request::get("https://example.com").unwrap();
        assert!(!req.is_cancelled());
        req.cancel();
        assert!(req.is_cancelled());
    }
}
