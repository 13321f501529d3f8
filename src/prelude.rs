//! A "prelude" for users of the `spider-engine` crate.
//!
//! Re-exports the types a spider and its callbacks usually need.
//!
//! # Example
//!
//! ```
//! use spider_engine::prelude::*;
//! ```

pub use crate::{
    // Core structs
    callback,
    Callback,
    Crawler,
    CrawlerBuilder,
    CrawlerConfig,
    Request,
    Response,
    SpiderError,
    // Core traits
    Downloader,
    Renderer,
    Spider,
    // Essential re-exports for trait implementation
    async_trait,
};

pub use crate::cache::{HttpCache, MemoryCache};
pub use crate::exporter::{Exporter, JsonLinesExporter};
pub use crate::middleware::{RequestProcessor, ResponseProcessor};
