use super::RequestProcessor;
use crate::dedup::VisitedSet;
use crate::error::SpiderError;
use crate::request::Request;
use async_trait::async_trait;
use dashmap::DashSet;
use log::debug;
use reqwest::Method;
use std::sync::Arc;

/// Cancels GET requests whose fingerprint was already scheduled.
///
/// Other methods always pass, and so does everything when revisiting is
/// enabled. Each duplicate fingerprint is logged once.
#[derive(Debug)]
pub struct DuplicateRequests {
    visited: Arc<VisitedSet>,
    revisit_enabled: bool,
    logged: DashSet<String>,
}

impl DuplicateRequests {
    pub fn new(visited: Arc<VisitedSet>, revisit_enabled: bool) -> Self {
        Self {
            visited,
            revisit_enabled,
            logged: DashSet::new(),
        }
    }

    /// Distinct duplicate fingerprints seen so far.
    pub fn duplicates_logged(&self) -> usize {
        self.logged.len()
    }
}

#[async_trait]
impl RequestProcessor for DuplicateRequests {
    fn name(&self) -> &str {
        "DuplicateRequests"
    }

    async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError> {
        if self.revisit_enabled || request.method != Method::GET {
            return Ok(());
        }
        let key = request.fingerprint();
        if self.visited.check_and_insert(&key) {
            if self.logged.insert(key) {
                debug!("URL already visited: {}", request.url);
            }
            request.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_get_is_cancelled_and_logged_once() {
        let processor = DuplicateRequests::new(Arc::new(VisitedSet::new()), false);

        let mut first = Request::get("https://example.com/a").unwrap();
        processor.process_request(&mut first).await.unwrap();
        assert!(!first.is_cancelled());

        for _ in 0..3 {
            let mut again = Request::get("https://example.com/a").unwrap();
            processor.process_request(&mut again).await.unwrap();
            assert!(again.is_cancelled());
        }
        assert_eq!(processor.duplicates_logged(), 1);
    }

    #[tokio::test]
    async fn non_get_and_revisit_pass_through() {
        let processor = DuplicateRequests::new(Arc::new(VisitedSet::new()), false);
        for _ in 0..2 {
            let mut post = Request::new("POST", "https://example.com/form").unwrap();
            processor.process_request(&mut post).await.unwrap();
            assert!(!post.is_cancelled());
        }

        let revisit = DuplicateRequests::new(Arc::new(VisitedSet::new()), true);
        for _ in 0..2 {
            let mut get = Request::get("https://example.com/a").unwrap();
            revisit.process_request(&mut get).await.unwrap();
            assert!(!get.is_cancelled());
        }
    }
}
