use super::RequestProcessor;
use crate::error::SpiderError;
use crate::request::Request;
use crate::robots::RobotsCache;
use crate::stats::StatCollector;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

/// Cancels requests the target host's robots.txt forbids.
pub struct RobotsTxt {
    cache: Arc<RobotsCache>,
    stats: Arc<StatCollector>,
}

impl RobotsTxt {
    pub fn new(cache: Arc<RobotsCache>, stats: Arc<StatCollector>) -> Self {
        Self { cache, stats }
    }
}

#[async_trait]
impl RequestProcessor for RobotsTxt {
    fn name(&self) -> &str {
        "RobotsTxt"
    }

    async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError> {
        let policy = self.cache.get_or_fetch(request).await;
        if !policy.allows(request.url.as_str()) {
            info!("Forbidden by robots.txt: {}", request.url);
            self.stats.record_robots_forbidden(request.method.as_str());
            request.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::ReqwestClientDownloader;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn processor_for(server: &MockServer, robots: ResponseTemplate) -> (RobotsTxt, Arc<StatCollector>) {
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(robots)
            .mount(server)
            .await;
        let stats = Arc::new(StatCollector::new());
        let cache = Arc::new(RobotsCache::new(
            Arc::new(ReqwestClientDownloader::default()),
            "test-bot",
            Arc::clone(&stats),
        ));
        (RobotsTxt::new(cache, Arc::clone(&stats)), stats)
    }

    #[tokio::test]
    async fn cancels_disallowed_paths() {
        let server = MockServer::start().await;
        let robots = ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin\n");
        let (processor, stats) = processor_for(&server, robots).await;

        let mut blocked = Request::get(&format!("{}/admin/panel", server.uri())).unwrap();
        processor.process_request(&mut blocked).await.unwrap();
        assert!(blocked.is_cancelled());

        let mut open = Request::get(&format!("{}/index.html", server.uri())).unwrap();
        processor.process_request(&mut open).await.unwrap();
        assert!(!open.is_cancelled());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.robots_forbidden, 1);
        assert_eq!(snapshot.robots_forbidden_by_method.get("GET"), Some(&1));
        assert_eq!(snapshot.robots_status_counts.get(&200), Some(&1));
    }

    #[tokio::test]
    async fn server_error_forbids_everything() {
        let server = MockServer::start().await;
        let (processor, _) = processor_for(&server, ResponseTemplate::new(503)).await;

        let mut request = Request::get(&format!("{}/anything", server.uri())).unwrap();
        processor.process_request(&mut request).await.unwrap();
        assert!(request.is_cancelled());
    }

    #[tokio::test]
    async fn missing_robots_allows_everything() {
        let server = MockServer::start().await;
        let (processor, _) = processor_for(&server, ResponseTemplate::new(404)).await;

        let mut request = Request::get(&format!("{}/anything", server.uri())).unwrap();
        processor.process_request(&mut request).await.unwrap();
        assert!(!request.is_cancelled());
    }
}
