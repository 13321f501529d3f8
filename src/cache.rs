//! Response cache consulted by the transport before going to the network.
//!
//! Only GET requests are looked up or stored, and only responses whose
//! status the retry policy would not retry are stored.

use crate::request::Request;
use crate::response::RawResponse;
use moka::sync::Cache;

/// Storage for fetched responses, keyed by request.
pub trait HttpCache: Send + Sync + 'static {
    fn lookup(&self, request: &Request) -> Option<RawResponse>;
    fn store(&self, request: &Request, response: &RawResponse);
}

/// A bounded in-memory cache keyed by the request fingerprint.
pub struct MemoryCache {
    entries: Cache<String, RawResponse>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_entries` responses.
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::new(max_entries),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl HttpCache for MemoryCache {
    fn lookup(&self, request: &Request) -> Option<RawResponse> {
        self.entries.get(&request.fingerprint())
    }

    fn store(&self, request: &Request, response: &RawResponse) {
        self.entries.insert(request.fingerprint(), response.clone());
    }
}
