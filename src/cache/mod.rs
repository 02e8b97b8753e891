/*
 * Short-lived memoization of comparison results
 */

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use crate::models::RouteRequest;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// TTL map with lazy eviction on lookup and an explicit purge for the janitor.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|entry| entry.value)
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical cache key for a request. Identifiers and addresses compare
/// case-insensitively, the amount is kept verbatim.
#[must_use]
pub fn fingerprint(request: &RouteRequest) -> String {
    let lower = |s: &str| s.trim().to_lowercase();
    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        request.chain_id,
        lower(&request.token_in),
        lower(&request.token_out),
        request.amount_in,
        request.slippage_bps,
        request.from_address.as_deref().map(lower).unwrap_or_default(),
        request.to_address.as_deref().map(lower).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_never_hits() {
        let cache = ResultCache::new();
        cache.set("k", 1, Duration::ZERO);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn fresh_entry_hits_immediately() {
        let cache = ResultCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_lookup() {
        let cache = ResultCache::new();
        cache.set("old", 1, Duration::from_millis(10));
        cache.set("new", 2, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);

        let later = Instant::now() + Duration::from_millis(50);
        assert_eq!(cache.get_at("old", later), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at("new", later), Some(2));
    }

    #[test]
    fn purge_and_remove() {
        let cache = ResultCache::new();
        cache.set("a", 1, Duration::ZERO);
        cache.set("b", 2, Duration::ZERO);
        cache.set("c", 3, Duration::from_secs(60));
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.remove("c"), Some(3));
        assert_eq!(cache.remove("c"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn fingerprint_ignores_identifier_case() {
        let mut request = RouteRequest {
            chain_id: 1,
            token_in: "ETH".to_string(),
            token_out: "0xA0b86991c6218b36c1d19d4a2e9eB0cE3606eB48".to_string(),
            amount_in: "1.50".to_string(),
            slippage_bps: 50,
            from_address: None,
            to_address: None,
        };
        let key = fingerprint(&request);
        assert_eq!(key, "1|eth|0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48|1.50|50||");

        request.token_in = "eth".to_string();
        assert_eq!(fingerprint(&request), key);

        request.amount_in = "1.5".to_string();
        assert_ne!(fingerprint(&request), key);
    }
}
