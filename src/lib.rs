//! # spider-engine
//!
//! A concurrent crawl engine with politeness limits and a request/response
//! middleware pipeline.
//!
//! Provides the main components: `Crawler`, `CrawlerBuilder`, the `Spider`
//! trait, the transport and middleware seams, and exporters.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::prelude::*;
//!
//! struct TitleSpider;
//!
//! impl Spider for TitleSpider {
//!     fn start_urls(&self) -> Vec<String> {
//!         vec!["https://example.com".into()]
//!     }
//!
//!     fn parse(&self, crawler: &Crawler, response: Response) -> Result<(), SpiderError> {
//!         crawler.export(serde_json::json!({
//!             "url": response.url.as_str(),
//!             "status": response.status.as_u16(),
//!         }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SpiderError> {
//!     let crawler = CrawlerBuilder::new(TitleSpider)
//!         .concurrent_requests_per_domain(2)
//!         .add_exporter(JsonLinesExporter::new("out.jl"))
//!         .build()?;
//!     crawler.run().await
//! }
//! ```

pub mod builder;
pub mod cache;
pub mod concurrency;
pub mod crawler;
pub mod dedup;
pub mod downloader;
pub mod error;
pub mod exporter;
pub mod middleware;
pub mod prelude;
pub mod request;
pub mod response;
pub mod robots;
pub mod spider;
pub mod state;
pub mod stats;

pub use builder::{CrawlerBuilder, CrawlerConfig};
pub use crawler::{callback, Callback, Crawler};
pub use downloader::{Downloader, Renderer, ReqwestClientDownloader};
pub use error::SpiderError;
pub use request::Request;
pub use response::{RawResponse, Response};
pub use spider::Spider;

pub use async_trait::async_trait;
pub use tokio;
