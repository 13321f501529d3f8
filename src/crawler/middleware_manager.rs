//! Middleware Manager: runs the processor chains in order.
//!
//! Processors are stored behind `Arc` and are internally synchronized, so
//! the manager is shared by every dispatch without a lock.

use crate::error::SpiderError;
use crate::middleware::{RequestProcessor, ResponseProcessor};
use crate::request::Request;
use crate::response::Response;
use log::{debug, trace};
use std::sync::Arc;

/// What the request chain decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewareAction {
    /// Every processor ran; fetch the request.
    Continue,
    /// A processor cancelled the request.
    Drop,
}

/// The request and response processor chains, built-ins first.
#[derive(Default)]
pub(crate) struct MiddlewareManager {
    request_processors: Vec<Arc<dyn RequestProcessor>>,
    response_processors: Vec<Arc<dyn ResponseProcessor>>,
}

impl MiddlewareManager {
    pub(crate) fn new(
        request_processors: Vec<Arc<dyn RequestProcessor>>,
        response_processors: Vec<Arc<dyn ResponseProcessor>>,
    ) -> Self {
        Self {
            request_processors,
            response_processors,
        }
    }

    /// Runs the request processors in order, stopping at the first
    /// cancellation or error.
    pub(crate) async fn process_request(&self, request: &mut Request) -> Result<MiddlewareAction, SpiderError> {
        for processor in &self.request_processors {
            trace!("{} processing request {}", processor.name(), request.url);
            processor.process_request(request).await?;
            if request.is_cancelled() {
                debug!("Request dropped by {} for URL: {}", processor.name(), request.url);
                return Ok(MiddlewareAction::Drop);
            }
        }
        Ok(MiddlewareAction::Continue)
    }

    /// Runs the response processors in order.
    pub(crate) fn process_response(&self, response: &mut Response) {
        for processor in &self.response_processors {
            trace!("{} processing response {}", processor.name(), response.url);
            processor.process_response(response);
        }
    }

    pub(crate) fn request_processor_names(&self) -> Vec<&str> {
        self.request_processors.iter().map(|p| p.name()).collect()
    }

    pub(crate) fn response_processor_names(&self) -> Vec<&str> {
        self.response_processors.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait]
    impl RequestProcessor for Counting {
        async fn process_request(&self, _request: &mut Request) -> Result<(), SpiderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Cancel;

    #[async_trait]
    impl RequestProcessor for Cancel {
        async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError> {
            request.cancel();
            Ok(())
        }
    }

    struct Fail;

    #[async_trait]
    impl RequestProcessor for Fail {
        async fn process_request(&self, _request: &mut Request) -> Result<(), SpiderError> {
            Err(SpiderError::ConfigurationError("broken".into()))
        }
    }

    #[tokio::test]
    async fn cancellation_short_circuits_the_chain() {
        let before = Arc::new(Counting(AtomicUsize::new(0)));
        let after = Arc::new(Counting(AtomicUsize::new(0)));
        let chain: Vec<Arc<dyn RequestProcessor>> = vec![before.clone(), Arc::new(Cancel), after.clone()];
        let manager = MiddlewareManager::new(chain, Vec::new());

        let mut request = Request::get("https://example.com/").unwrap();
        let action = manager.process_request(&mut request).await.unwrap();

        assert_eq!(action, MiddlewareAction::Drop);
        assert_eq!(before.0.load(Ordering::SeqCst), 1);
        assert_eq!(after.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn error_stops_the_chain() {
        let after = Arc::new(Counting(AtomicUsize::new(0)));
        let chain: Vec<Arc<dyn RequestProcessor>> = vec![Arc::new(Fail), after.clone()];
        let manager = MiddlewareManager::new(chain, Vec::new());

        let mut request = Request::get("https://example.com/").unwrap();
        assert!(manager.process_request(&mut request).await.is_err());
        assert_eq!(after.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_chain_continues() {
        let manager = MiddlewareManager::default();
        let mut request = Request::get("https://example.com/").unwrap();
        assert_eq!(
            manager.process_request(&mut request).await.unwrap(),
            MiddlewareAction::Continue
        );
    }
}
