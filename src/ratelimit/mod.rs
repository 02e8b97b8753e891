/*
 * Sliding-window admission control per client identity
 */

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: usize,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits the hit when fewer than `limit` admissions fall inside the
    /// trailing `window`. Rejected hits are not recorded.
    pub fn hit(&self, identity: &str, limit: usize, window: Duration) -> RateDecision {
        self.hit_at(identity, limit, window, Instant::now())
    }

    fn hit_at(&self, identity: &str, limit: usize, window: Duration, now: Instant) -> RateDecision {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets.entry(identity.to_string()).or_default();
        discard_stale(bucket, window, now);

        if bucket.len() >= limit {
            return RateDecision { allowed: false, remaining: 0 };
        }
        bucket.push_back(now);
        RateDecision { allowed: true, remaining: limit - bucket.len() }
    }

    /// Drops buckets without any admission inside `window`.
    pub fn prune_idle(&self, window: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            discard_stale(bucket, window, now);
            !bucket.is_empty()
        });
        before - buckets.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn discard_stale(bucket: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    // Near process start `now - window` may not be representable; nothing is stale then.
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };
    while bucket.front().is_some_and(|stamp| *stamp <= cutoff) {
        bucket.pop_front();
    }
}
