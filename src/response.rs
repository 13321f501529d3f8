//! Responses handed to callbacks, and the raw transport output they are built from.

use crate::request::Request;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use scraper::Html;
use serde_json::Value;
use std::borrow::Cow;
use url::Url;

const HTML_CONTENT_TYPES: [&str; 3] = [
    "text/html",
    "application/xhtml+xml",
    "application/vnd.wap.xhtml+xml",
];

/// What a transport returns for one attempt.
///
/// Cheap to clone (the body is reference counted), so it can be stored in
/// the response cache and inspected by the retry policy.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Final URL after redirects.
    pub url: Url,
    pub body: Bytes,
    /// Served from the HTTP cache rather than the network.
    pub cached: bool,
}

impl RawResponse {
    pub fn new(status: StatusCode, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url,
            body: body.into(),
            cached: false,
        }
    }
}

/// A completed response, delivered to response processors and then to the callback.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: Bytes,
    pub cached: bool,
    /// Parsed HTML document, set by the `ParseDocument` processor.
    pub document: Option<Html>,
    request: Request,
}

impl Response {
    pub(crate) fn new(raw: RawResponse, request: Request) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            url: raw.url,
            body: raw.body,
            cached: raw.cached,
            document: None,
            request,
        }
    }

    /// The request this response answers.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Metadata attached to the originating request.
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.request.meta.get(key)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Checks the `Content-Type` header for an HTML media type.
    pub fn is_html(&self) -> bool {
        let content_type = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        HTML_CONTENT_TYPES
            .iter()
            .any(|html| content_type.contains(html))
    }

    /// Resolves a possibly relative link against the response URL.
    pub fn join_url(&self, link: &str) -> Option<Url> {
        self.url.join(link).ok()
    }
}
