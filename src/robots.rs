//! Per-host robots.txt cache.
//!
//! Policies are fetched on first access to a host and kept for the lifetime
//! of the crawler. The read path is a plain `DashMap` lookup; on a miss the
//! fetch runs without holding any lock, so two first-time requests to the
//! same host may both fetch `/robots.txt`. The second insert simply replaces
//! an equivalent policy.

use crate::downloader::Downloader;
use crate::request::Request;
use crate::stats::StatCollector;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use texting_robots::Robot;
use tracing::{debug, trace, warn};

/// The rules that apply to one host.
pub enum RobotsPolicy {
    AllowAll,
    DisallowAll,
    Rules(Box<Robot>),
}

impl RobotsPolicy {
    /// Builds a policy from a robots.txt response.
    ///
    /// 2xx parses the body, 4xx allows everything, 5xx forbids everything.
    /// Any other status has no defined meaning and yields `None`.
    pub fn from_status_and_body(status: u16, agent: &str, body: &[u8]) -> Option<Self> {
        match status {
            200..=299 => match Robot::new(agent, body) {
                Ok(robot) => Some(Self::Rules(Box::new(robot))),
                Err(e) => {
                    warn!("Unparsable robots.txt, allowing all: {}", e);
                    Some(Self::AllowAll)
                }
            },
            400..=499 => Some(Self::AllowAll),
            500..=599 => Some(Self::DisallowAll),
            _ => None,
        }
    }

    /// Tests whether `url` may be fetched.
    pub fn allows(&self, url: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DisallowAll => false,
            Self::Rules(robot) => robot.allowed(url),
        }
    }
}

impl std::fmt::Debug for RobotsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllowAll => f.write_str("AllowAll"),
            Self::DisallowAll => f.write_str("DisallowAll"),
            Self::Rules(robot) => f
                .debug_struct("Rules")
                .field("delay", &robot.delay)
                .finish_non_exhaustive(),
        }
    }
}

struct CachedPolicy {
    policy: Arc<RobotsPolicy>,
    fetched_at: Instant,
}

/// Caches one `RobotsPolicy` per host.
pub struct RobotsCache {
    fetcher: Arc<dyn Downloader>,
    user_agent: String,
    policies: DashMap<String, CachedPolicy>,
    stats: Arc<StatCollector>,
}

impl RobotsCache {
    /// Creates a cache that fetches through `fetcher` directly, bypassing
    /// the middleware pipeline and the limiter.
    pub fn new(fetcher: Arc<dyn Downloader>, user_agent: impl Into<String>, stats: Arc<StatCollector>) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.into(),
            policies: DashMap::new(),
            stats,
        }
    }

    /// Returns the cached policy for the request's host, fetching it first
    /// if needed. Fetch failures allow everything and are not cached, so the
    /// next request to that host tries again.
    pub async fn get_or_fetch(&self, request: &Request) -> Arc<RobotsPolicy> {
        let host = request.host_key();
        if let Some(cached) = self.policies.get(&host) {
            trace!("robots.txt cache hit for {}", host);
            return Arc::clone(&cached.policy);
        }

        match self.fetch(request).await {
            Some(policy) => {
                let policy = Arc::new(policy);
                self.policies.insert(
                    host,
                    CachedPolicy {
                        policy: Arc::clone(&policy),
                        fetched_at: Instant::now(),
                    },
                );
                policy
            }
            None => Arc::new(RobotsPolicy::AllowAll),
        }
    }

    async fn fetch(&self, request: &Request) -> Option<RobotsPolicy> {
        let mut robots_url = request.url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);

        let mut robots_request = Request::from_parts(reqwest::Method::GET, robots_url);
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&self.user_agent) {
            robots_request
                .headers
                .insert(reqwest::header::USER_AGENT, value);
        }

        debug!("Fetching {}", robots_request.url);
        self.stats.record_robots_request();
        let response = match self.fetcher.download(&robots_request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("robots.txt fetch failed for {}: {}", robots_request.url, e);
                return None;
            }
        };
        self.stats.record_robots_response(response.status.as_u16());

        RobotsPolicy::from_status_and_body(response.status.as_u16(), &self.user_agent, &response.body)
    }

    /// When the policy for `host` was fetched, if it is cached.
    pub fn fetched_at(&self, host: &str) -> Option<Instant> {
        self.policies.get(host).map(|cached| cached.fetched_at)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
