//! # Crawler Module
//!
//! Implements the crawl engine.
//!
//! ## Overview
//!
//! The crawler module provides the `Crawler` handle and the machinery behind
//! it: submission, per-request dispatch and the middleware chains.
//!
//! ## Key Components
//!
//! - **Crawler**: the cheap-to-clone handle passed to every callback
//! - **Dispatch**: one task per request (or the sequential lane for
//!   synchronized requests) running permits, request processors, transport,
//!   response processors and the callback
//! - **Middleware Manager**: runs the processor chains in order
//!
//! ## Architecture
//!
//! Nothing is queued centrally. `submit` counts the request as outstanding
//! and spawns its dispatch immediately; the limiter is what throttles the
//! spawned tasks. `run()` waits on the outstanding counter, so the crawl ends
//! exactly when the last dispatch (including everything its callback
//! submitted) has finished.

mod core;
mod middleware_manager;
mod request_handler;

pub use core::{callback, Callback, Crawler};
pub(crate) use core::{CrawlerInner, LaneJob};
pub use middleware_manager::MiddlewareAction;
pub(crate) use middleware_manager::MiddlewareManager;
