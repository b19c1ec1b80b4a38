//! Per-client token-bucket rate limiting (spec §6.1: "token-bucket per
//! client; exceeding returns 429"). No teacher module implements HTTP rate
//! limiting; built directly on the workspace's `governor` + `dashmap`
//! dependencies, which is the idiomatic Rust combination for a keyed
//! token bucket: one `governor::RateLimiter` per client key, held in a
//! `DashMap` so concurrent requests from different clients never contend
//! on the same lock.

use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::{Quota, RateLimiter as GovernorLimiter};

use pipeline_config::RateLimitConfig;

type ClientLimiter = GovernorLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

/// Tracks one token bucket per client key (typically the caller's IP or
/// an API key); entries live for the process lifetime, matching the
/// teacher's in-memory, no-persistence approach to ephemeral server-side
/// state.
pub struct ClientRateLimiter {
    buckets: DashMap<String, Arc<ClientLimiter>>,
    quota: Quota,
}

impl ClientRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute.max(1)).unwrap();
        let burst = NonZeroU32::new(config.burst.max(1)).unwrap();
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self { buckets: DashMap::new(), quota }
    }

    /// Returns `true` if `client_key`'s bucket has capacity for one more
    /// request right now, consuming a token if so.
    pub fn check(&self, client_key: &str) -> bool {
        let bucket = self
            .buckets
            .entry(client_key.to_string())
            .or_insert_with(|| Arc::new(GovernorLimiter::direct(self.quota)))
            .clone();

        bucket.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests_per_minute: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig { requests_per_minute, burst }
    }

    #[test]
    fn allows_requests_within_burst() {
        let limiter = ClientRateLimiter::new(&config(60, 3));
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-a"));
    }

    #[test]
    fn rejects_once_burst_is_exhausted() {
        let limiter = ClientRateLimiter::new(&config(60, 1));
        assert!(limiter.check("client-a"));
        assert!(!limiter.check("client-a"));
    }

    #[test]
    fn tracks_clients_independently() {
        let limiter = ClientRateLimiter::new(&config(60, 1));
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-b"));
        assert!(!limiter.check("client-a"));
    }
}
