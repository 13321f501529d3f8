//! Contains the dispatch logic for a single request.
//!
//! A dispatch walks one request through the whole engine:
//!
//! - acquiring host, global and rate-limit permits
//! - running the request processors, stopping if one cancels
//! - fetching through the transport, with retries
//! - running the response processors and the callback
//! - releasing permits and the outstanding-work guard
//!
//! The whole dispatch runs behind a panic barrier, so a panicking processor,
//! downloader, renderer or callback is logged and counted and the crawl goes
//! on. Synchronized requests go through the same function, driven one at a
//! time by the sequential lane task.

use super::core::{Callback, Crawler};
use super::middleware_manager::MiddlewareAction;
use crate::error::SpiderError;
use crate::request::Request;
use crate::response::{RawResponse, Response};
use crate::state::WorkGuard;
use futures_util::FutureExt;
use log::{debug, error, trace, warn};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Once;
use tokio::task::JoinHandle;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chains a panic hook that records a backtrace of the panicking thread
/// before handing over to the previously installed hook.
pub(crate) fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture();
            let _ = PANIC_BACKTRACE.try_with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

/// Takes the backtrace recorded by the last panic on this thread.
fn take_panic_backtrace() -> String {
    PANIC_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .map(|backtrace| backtrace.to_string())
        .unwrap_or_else(|| "<no backtrace recorded>".to_string())
}

impl Crawler {
    /// Dispatches one request behind the panic barrier. `guard` keeps the
    /// request counted as outstanding until the panic, if any, is recorded.
    pub(crate) async fn dispatch_guarded(&self, request: Request, callback: Option<Callback>, guard: WorkGuard) {
        let url = request.url.clone();
        let outcome = AssertUnwindSafe(self.dispatch(request, callback))
            .catch_unwind()
            .await;
        if let Err(payload) = outcome {
            self.inner.stats.increment_panics();
            error!(
                "Dispatch of {} panicked: {}\n{}",
                url,
                panic_message(&*payload),
                take_panic_backtrace()
            );
        }
        drop(guard);
    }

    /// Runs one request to completion.
    async fn dispatch(&self, mut request: Request, callback: Option<Callback>) {
        let inner = &self.inner;

        trace!("Waiting for permits: {}", request.url);
        let permits = inner.limiter.acquire(&request.host_key()).await;

        trace!("Processing request through middlewares: {}", request.url);
        match inner.middlewares.process_request(&mut request).await {
            Ok(MiddlewareAction::Continue) => {}
            Ok(MiddlewareAction::Drop) => {
                inner.stats.increment_requests_dropped();
                return;
            }
            Err(e) => {
                error!("Request middleware error for URL {}: {}", request.url, e);
                inner.stats.increment_requests_failed();
                self.report_error(&request, &e);
                return;
            }
        }

        trace!("Downloading request for URL: {}", request.url);
        let raw = match inner.transport.fetch(&mut request).await {
            Ok(raw) => raw,
            Err(e) => {
                inner.stats.increment_requests_failed();
                self.report_error(&request, &e);
                return;
            }
        };
        inner.stats.increment_requests_succeeded();
        inner.stats.add_bytes_downloaded(raw.body.len());

        self.deliver(raw, request, callback);
        drop(permits);
    }

    /// Builds the `Response`, runs the response processors and the callback.
    ///
    /// Synchronous: the parsed document is not `Send`, so nothing after this
    /// point may suspend. A panic in a processor or the callback is logged,
    /// counted and swallowed.
    fn deliver(&self, raw: RawResponse, request: Request, callback: Option<Callback>) {
        let url = request.url.clone();
        let inner = &self.inner;

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut response = Response::new(raw, request);
            inner.middlewares.process_response(&mut response);
            match &callback {
                Some(callback) => callback(self, response),
                None => inner.spider.parse(self, response),
            }
        }));

        match outcome {
            Ok(Ok(())) => trace!("Callback finished for {}", url),
            Ok(Err(e)) => {
                inner.stats.increment_callback_errors();
                error!("Callback for {} failed: {}", url, e);
            }
            Err(payload) => {
                inner.stats.increment_panics();
                error!(
                    "Callback for {} panicked: {}\n{}",
                    url,
                    panic_message(&*payload),
                    take_panic_backtrace()
                );
            }
        }
    }

    fn report_error(&self, request: &Request, error: &SpiderError) {
        let reported = catch_unwind(AssertUnwindSafe(|| {
            self.inner.spider.on_error(self, request, error)
        }));
        if reported.is_err() {
            self.inner.stats.increment_panics();
            error!(
                "Error callback panicked for {}\n{}",
                request.url,
                take_panic_backtrace()
            );
        }
    }

    /// Starts the task that dispatches synchronized requests in order.
    /// Returns `None` if the lane was already started. A panicking job is
    /// recorded and the lane moves on to the next one.
    pub(crate) fn spawn_sequential_lane(&self) -> Option<JoinHandle<()>> {
        let Some(rx) = self.inner.lane_rx.lock().take() else {
            warn!("Sequential lane already started");
            return None;
        };
        let crawler = self.clone();
        Some(tokio::spawn(async move {
            debug!("Sequential lane started");
            while let Ok(job) = rx.recv().await {
                crawler.dispatch_guarded(job.request, job.callback, job.guard).await;
            }
            debug!("Sequential lane finished");
        }))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtrace_is_recorded_at_the_panic_site() {
        install_panic_hook();
        let caught = catch_unwind(|| panic!("recorded"));
        assert!(caught.is_err());

        let backtrace = take_panic_backtrace();
        assert_ne!(backtrace, "<no backtrace recorded>");
        assert!(!backtrace.is_empty());
        // the slot is emptied by taking it
        assert_eq!(take_panic_backtrace(), "<no backtrace recorded>");
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let literal = catch_unwind(|| panic!("literal")).unwrap_err();
        assert_eq!(panic_message(&*literal), "literal");
        let formatted = catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*formatted), "formatted 7");
        let other = catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }
}
