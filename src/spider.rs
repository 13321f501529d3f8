//! # Spider Module
//!
//! Defines the `Spider` trait, the caller's side of a crawl.
//!
//! ## Overview
//!
//! A spider supplies the first requests and the default response callback.
//! Callbacks receive the `Crawler` handle, so following links is just a
//! matter of submitting more requests from inside `parse`; extracted data
//! goes to `Crawler::export`.
//!
//! ## Implementation
//!
//! Implementors must define:
//! - `parse`: the callback for requests submitted without their own callback
//!
//! and may override:
//! - `start_urls` / `start_requests`: what `run()` submits first
//! - `on_error`: what happens when a request fails after its retries
//!
//! ## Example
//!
//! ```rust,ignore
//! use scraper::Selector;
//! use spider_engine::prelude::*;
//!
//! struct QuotesSpider;
//!
//! impl Spider for QuotesSpider {
//!     fn start_urls(&self) -> Vec<String> {
//!         vec!["https://quotes.toscrape.com/".into()]
//!     }
//!
//!     fn parse(&self, crawler: &Crawler, response: Response) -> Result<(), SpiderError> {
//!         let Some(document) = &response.document else { return Ok(()) };
//!         let quote = Selector::parse("div.quote span.text").unwrap();
//!         for text in document.select(&quote) {
//!             crawler.export(serde_json::json!({ "text": text.text().collect::<String>() }))?;
//!         }
//!         let next = Selector::parse("li.next > a").unwrap();
//!         if let Some(href) = document.select(&next).next().and_then(|a| a.value().attr("href")) {
//!             if let Some(url) = response.join_url(href) {
//!                 crawler.get(url.as_str(), None);
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::crawler::Crawler;
use crate::error::SpiderError;
use crate::request::Request;
use crate::response::Response;
use tracing::error;

/// Defines the contract for a spider.
pub trait Spider: Send + Sync + 'static {
    /// URLs fetched with GET when the crawl starts.
    fn start_urls(&self) -> Vec<String> {
        Vec::new()
    }

    /// Submits the initial requests. The default GETs every `start_urls` entry
    /// with `parse` as the callback.
    fn start_requests(&self, crawler: &Crawler) {
        for url in self.start_urls() {
            crawler.get(&url, None);
        }
    }

    /// Handles a response whose request was submitted without a callback.
    fn parse(&self, crawler: &Crawler, response: Response) -> Result<(), SpiderError>;

    /// Called once for a request that failed in the request pipeline or in
    /// the transport (after its retries).
    fn on_error(&self, _crawler: &Crawler, request: &Request, error: &SpiderError) {
        error!("Request {} {} failed: {}", request.method, request.url, error);
    }
}
