//! # Middleware Module
//!
//! Request and response processors that run around the transport.
//!
//! ## Overview
//!
//! A `RequestProcessor` sees every dispatched request before it is fetched
//! and may mutate or cancel it. A `ResponseProcessor` sees every completed
//! response before the callback. A single type may implement both, as
//! `Metrics` does.
//!
//! ## Built-in Processors
//!
//! Request side, in the order the crawler installs them:
//! - **AllowedDomains**: cancels requests to hosts outside the allow-list
//! - **DuplicateRequests**: cancels GET requests that were already scheduled
//! - **Headers**: fills in default `Accept*` and `User-Agent` headers
//! - **Delay**: sleeps a fixed or randomized delay
//! - **RobotsTxt**: cancels requests forbidden by the host's robots.txt
//! - **Metrics**: counts requests by method
//!
//! Response side:
//! - **ParseDocument**: parses HTML bodies into a `scraper::Html`
//! - **LogStats**: logs one line per crawled response
//! - **Metrics**: counts responses by method and status
//!
//! Caller processors run after the built-ins.

mod allowed_domains;
mod delay;
mod duplicate_requests;
mod headers;
mod log_stats;
mod metrics;
mod parse_document;
mod robots_txt;

pub use allowed_domains::AllowedDomains;
pub use delay::Delay;
pub use duplicate_requests::DuplicateRequests;
pub use headers::{Headers, DEFAULT_ACCEPT, DEFAULT_ACCEPT_CHARSET, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT};
pub use log_stats::LogStats;
pub use metrics::Metrics;
pub use parse_document::ParseDocument;
pub use robots_txt::RobotsTxt;

use crate::error::SpiderError;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;

/// Inspects or rewrites a request before it is fetched.
///
/// Call `request.cancel()` to stop the request; no later processor runs and
/// nothing is fetched. Returning `Err` abandons the request as well.
#[async_trait]
pub trait RequestProcessor: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError>;
}

/// Inspects or enriches a response before the callback sees it.
///
/// Response processors run synchronously, after the last network suspension
/// point of a dispatch.
pub trait ResponseProcessor: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn process_response(&self, response: &mut Response);
}
