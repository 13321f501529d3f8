use super::{RequestProcessor, ResponseProcessor};
use crate::error::SpiderError;
use crate::request::Request;
use crate::response::Response;
use crate::stats::StatCollector;
use async_trait::async_trait;
use std::sync::Arc;

/// Counts requests by method and responses by method and status.
pub struct Metrics {
    stats: Arc<StatCollector>,
}

impl Metrics {
    pub fn new(stats: Arc<StatCollector>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl RequestProcessor for Metrics {
    fn name(&self) -> &str {
        "Metrics"
    }

    async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError> {
        self.stats.record_request(request.method.as_str());
        Ok(())
    }
}

impl ResponseProcessor for Metrics {
    fn name(&self) -> &str {
        "Metrics"
    }

    fn process_response(&self, response: &mut Response) {
        self.stats
            .record_response(response.request().method.as_str(), response.status.as_u16());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::RawResponse;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn counts_by_method_and_status() {
        let stats = Arc::new(StatCollector::new());
        let metrics = Metrics::new(Arc::clone(&stats));

        let mut request = Request::new("HEAD", "https://example.com/").unwrap();
        metrics.process_request(&mut request).await.unwrap();

        let raw = RawResponse::new(StatusCode::NOT_FOUND, request.url.clone(), "");
        let mut response = Response::new(raw, request);
        metrics.process_response(&mut response);

        assert_eq!(stats.requests_for_method("HEAD"), 1);
        assert_eq!(stats.responses_with_status(404), 1);
        assert_eq!(stats.snapshot().responses_by_method.get("HEAD"), Some(&1));
    }
}
