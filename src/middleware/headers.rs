use super::RequestProcessor;
use crate::error::SpiderError;
use crate::request::Request;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, ACCEPT_CHARSET, ACCEPT_LANGUAGE, USER_AGENT};

pub const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const DEFAULT_ACCEPT_CHARSET: &str = "utf-8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en";
pub const DEFAULT_USER_AGENT: &str = concat!("spider-engine/", env!("CARGO_PKG_VERSION"));

/// Sets default request headers. Headers already on the request win.
#[derive(Debug, Clone)]
pub struct Headers {
    user_agent: HeaderValue,
}

impl Headers {
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `user_agent` is not a valid header value.
    pub fn new(user_agent: &str) -> Result<Self, SpiderError> {
        let user_agent = HeaderValue::from_str(user_agent).map_err(|e| {
            SpiderError::ConfigurationError(format!("invalid user agent '{user_agent}': {e}"))
        })?;
        Ok(Self { user_agent })
    }
}

impl Default for Headers {
    fn default() -> Self {
        Self {
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }
}

#[async_trait]
impl RequestProcessor for Headers {
    fn name(&self) -> &str {
        "Headers"
    }

    async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError> {
        let headers = &mut request.headers;
        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static(DEFAULT_ACCEPT));
        headers
            .entry(ACCEPT_CHARSET)
            .or_insert(HeaderValue::from_static(DEFAULT_ACCEPT_CHARSET));
        headers
            .entry(ACCEPT_LANGUAGE)
            .or_insert(HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fills_missing_headers_only() {
        let processor = Headers::new("custom-bot/1.0").unwrap();
        let mut request = Request::get("https://example.com/")
            .unwrap()
            .with_header("accept-language", "de")
            .unwrap();
        processor.process_request(&mut request).await.unwrap();

        assert_eq!(request.headers[ACCEPT], DEFAULT_ACCEPT);
        assert_eq!(request.headers[ACCEPT_CHARSET], "utf-8");
        assert_eq!(request.headers[ACCEPT_LANGUAGE], "de");
        assert_eq!(request.user_agent(), Some("custom-bot/1.0"));
    }

    #[test]
    fn rejects_invalid_user_agent() {
        assert!(matches!(
            Headers::new("bad\nagent"),
            Err(SpiderError::ConfigurationError(_))
        ));
    }
}
