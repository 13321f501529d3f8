use super::RequestProcessor;
use crate::error::SpiderError;
use crate::request::Request;
use async_trait::async_trait;
use dashmap::DashSet;
use log::warn;
use std::collections::HashSet;

/// Cancels requests whose host is not in the allow-list.
///
/// A host matches by name (`example.com`) or by name and port
/// (`127.0.0.1:8080`). An empty list allows every host.
#[derive(Debug, Default)]
pub struct AllowedDomains {
    domains: HashSet<String>,
    logged: DashSet<String>,
}

impl AllowedDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
            logged: DashSet::new(),
        }
    }

    pub fn is_allowed(&self, request: &Request) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let host = request.url.host_str().unwrap_or_default();
        self.domains.contains(host) || self.domains.contains(&request.host_key())
    }
}

#[async_trait]
impl RequestProcessor for AllowedDomains {
    fn name(&self) -> &str {
        "AllowedDomains"
    }

    async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError> {
        if self.is_allowed(request) {
            return Ok(());
        }
        let host = request.host_key();
        if self.logged.insert(host.clone()) {
            warn!("Domain not allowed: {}", host);
        }
        request.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_list_allows_everything() {
        let processor = AllowedDomains::default();
        let mut request = Request::get("https://anywhere.example/").unwrap();
        processor.process_request(&mut request).await.unwrap();
        assert!(!request.is_cancelled());
    }

    #[tokio::test]
    async fn matches_host_or_host_and_port() {
        let processor = AllowedDomains::new(["example.com", "127.0.0.1:8080"]);

        let mut by_name = Request::get("https://example.com:4443/a").unwrap();
        processor.process_request(&mut by_name).await.unwrap();
        assert!(!by_name.is_cancelled());

        let mut by_port = Request::get("http://127.0.0.1:8080/a").unwrap();
        processor.process_request(&mut by_port).await.unwrap();
        assert!(!by_port.is_cancelled());

        let mut other_port = Request::get("http://127.0.0.1:9090/a").unwrap();
        processor.process_request(&mut other_port).await.unwrap();
        assert!(other_port.is_cancelled());
    }

    #[tokio::test]
    async fn logs_each_rejected_host_once() {
        let processor = AllowedDomains::new(["example.com"]);
        for path in ["/a", "/b", "/c"] {
            let mut request = Request::get(&format!("https://other.example{path}")).unwrap();
            processor.process_request(&mut request).await.unwrap();
            assert!(request.is_cancelled());
        }
        assert_eq!(processor.logged.len(), 1);
    }
}
