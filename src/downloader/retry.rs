//! Retry decisions for the transport.

use crate::error::SpiderError;
use crate::response::RawResponse;
use reqwest::StatusCode;
use std::collections::HashSet;

pub const DEFAULT_RETRY_TIMES: usize = 2;

/// Server errors, Cloudflare timeouts (522, 524) and request timeout.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 7] = [500, 502, 503, 504, 522, 524, 408];

/// Decides whether an attempt is tried again. Retries are immediate.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retry_times: usize,
    pub retry_status_codes: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_times: DEFAULT_RETRY_TIMES,
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_times: usize, retry_status_codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            retry_times,
            retry_status_codes: retry_status_codes.into_iter().collect(),
        }
    }

    pub fn is_retry_status(&self, status: StatusCode) -> bool {
        self.retry_status_codes.contains(&status.as_u16())
    }

    /// `retries_spent` is the number of retries already made for the request.
    pub fn should_retry(&self, outcome: &Result<RawResponse, SpiderError>, retries_spent: usize) -> bool {
        if retries_spent >= self.retry_times {
            return false;
        }
        match outcome {
            Ok(raw) => self.is_retry_status(raw.status),
            Err(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn with_status(status: u16) -> Result<RawResponse, SpiderError> {
        Ok(RawResponse::new(
            StatusCode::from_u16(status).unwrap(),
            Url::parse("https://example.com").unwrap(),
            "",
        ))
    }

    #[test]
    fn retries_listed_statuses_until_budget_is_spent() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&with_status(503), 0));
        assert!(policy.should_retry(&with_status(408), 1));
        assert!(!policy.should_retry(&with_status(503), 2));
        assert!(!policy.should_retry(&with_status(404), 0));
    }

    #[test]
    fn retries_only_retryable_errors() {
        let policy = RetryPolicy::default();
        let io: Result<RawResponse, SpiderError> =
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into());
        assert!(policy.should_retry(&io, 0));

        let unavailable = Err(SpiderError::RendererUnavailable("https://example.com".into()));
        assert!(!policy.should_retry(&unavailable, 0));
    }

    #[test]
    fn zero_retry_times_disables_retries() {
        let policy = RetryPolicy::new(0, [503]);
        assert!(!policy.should_retry(&with_status(503), 0));
    }
}
