//! Concurrency and rate limiting for dispatched requests.
//!
//! The `Limiter` combines three gates, each optional:
//! - a lazily created semaphore per host,
//! - a global semaphore bounding in-flight requests across all hosts,
//! - a requests-per-second pacer.
//!
//! Permits are returned as a `Permits` guard; dropping it releases every
//! permit, so a unit that returns early or unwinds never leaks capacity.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Permits held by one request for the duration of its dispatch.
#[derive(Debug, Default)]
pub struct Permits {
    _global: Option<OwnedSemaphorePermit>,
    _host: Option<OwnedSemaphorePermit>,
}

/// Spaces acquisitions at least `1 / rate` seconds apart.
#[derive(Debug)]
struct RatePacer {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RatePacer {
    fn new(requests_per_second: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / requests_per_second),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Reserves the next free slot and sleeps until it starts.
    async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Global, per-host and requests-per-second limits.
#[derive(Debug)]
pub struct Limiter {
    global: Option<Arc<Semaphore>>,
    per_host_limit: usize,
    hosts: DashMap<String, Arc<Semaphore>>,
    pacer: Option<RatePacer>,
}

impl Limiter {
    /// Creates a limiter. A value of `0` disables the corresponding gate.
    pub fn new(max_concurrent: usize, max_per_host: usize, requests_per_second: f64) -> Self {
        Self {
            global: (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent))),
            per_host_limit: max_per_host,
            hosts: DashMap::new(),
            pacer: (requests_per_second > 0.0).then(|| RatePacer::new(requests_per_second)),
        }
    }

    /// A limiter with every gate disabled.
    pub fn unbounded() -> Self {
        Self::new(0, 0, 0.0)
    }

    /// Waits for a permit for `host`, then a global permit, then a rate slot.
    ///
    /// The host permit is taken first so a request blocked on a busy host
    /// never sits on global capacity other hosts could use. No map lock is
    /// held while waiting: the host semaphore is cloned out of the map.
    pub async fn acquire(&self, host: &str) -> Permits {
        let host = match self.host_semaphore(host) {
            Some(semaphore) => semaphore.acquire_owned().await.ok(),
            None => None,
        };

        let global = match &self.global {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };

        if let Some(pacer) = &self.pacer {
            pacer.wait().await;
        }

        Permits {
            _global: global,
            _host: host,
        }
    }

    fn host_semaphore(&self, host: &str) -> Option<Arc<Semaphore>> {
        if self.per_host_limit == 0 {
            return None;
        }
        if let Some(existing) = self.hosts.get(host) {
            return Some(Arc::clone(existing.value()));
        }
        let semaphore = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)));
        Some(Arc::clone(semaphore.value()))
    }

    /// Number of hosts that currently have a semaphore.
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }

    /// Global permits currently free, if the global gate is enabled.
    pub fn available_global(&self) -> Option<usize> {
        self.global.as_ref().map(|s| s.available_permits())
    }
}
