use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::clock::Clock;

/// Keyed TTL store backing MX lookups, verification results, and the rate
/// governor's counters (see SPEC_FULL.md §4.1).
///
/// Backend failures must never propagate to a caller of this trait's
/// implementations -- see [`InMemoryCacheStore`], whose methods simply log
/// and fail open. A Redis-backed implementation is expected to do the same.
#[async_trait]
pub trait CacheStore: Send + Sync {
	async fn get(&self, key: &str) -> Option<Value>;
	async fn set(&self, key: &str, value: Value, ttl: Duration);
	/// Increments (creating with count 1 and `ttl` if absent) and returns the
	/// new count.
	async fn incr(&self, key: &str, ttl: Duration) -> u64;
	async fn set_ttl(&self, key: &str, ttl: Duration);
	async fn exists(&self, key: &str) -> bool;
}

struct Entry {
	value: Value,
	expires_at: std::time::Instant,
}

/// Default in-process [`CacheStore`]: a sharded concurrent map keyed by
/// string, storing an opaque JSON value plus an absolute expiry instant.
/// Expired entries are swept lazily on access.
pub struct InMemoryCacheStore {
	map: DashMap<String, Entry>,
	clock: Arc<dyn Clock>,
}

impl InMemoryCacheStore {
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		InMemoryCacheStore {
			map: DashMap::new(),
			clock,
		}
	}

	fn is_expired(&self, entry: &Entry) -> bool {
		self.clock.now() >= entry.expires_at
	}
}

impl Default for InMemoryCacheStore {
	fn default() -> Self {
		Self::new(Arc::new(crate::clock::SystemClock))
	}
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
	async fn get(&self, key: &str) -> Option<Value> {
		let hit = self.map.get(key).and_then(|entry| {
			if self.is_expired(&entry) {
				None
			} else {
				Some(entry.value.clone())
			}
		});
		if hit.is_none() {
			// the `Ref` borrow above has already been dropped by here, so this
			// can't deadlock on the same shard's write lock.
			self.map.remove(key);
		}
		hit
	}

	async fn set(&self, key: &str, value: Value, ttl: Duration) {
		self.map.insert(
			key.to_string(),
			Entry {
				value,
				expires_at: self.clock.now() + ttl,
			},
		);
	}

	async fn incr(&self, key: &str, ttl: Duration) -> u64 {
		let now = self.clock.now();
		let mut entry = self.map.entry(key.to_string()).or_insert_with(|| Entry {
			value: Value::from(0u64),
			expires_at: now + ttl,
		});

		if now >= entry.expires_at {
			entry.value = Value::from(0u64);
			entry.expires_at = now + ttl;
		}

		let next = entry.value.as_u64().unwrap_or(0) + 1;
		entry.value = Value::from(next);
		next
	}

	async fn set_ttl(&self, key: &str, ttl: Duration) {
		if let Some(mut entry) = self.map.get_mut(key) {
			entry.expires_at = self.clock.now() + ttl;
		}
	}

	async fn exists(&self, key: &str) -> bool {
		self.get(key).await.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	#[tokio::test]
	async fn set_then_get_roundtrips() {
		let store = InMemoryCacheStore::default();
		store.set("k", Value::from("v"), Duration::from_secs(60)).await;
		assert_eq!(store.get("k").await, Some(Value::from("v")));
	}

	#[tokio::test]
	async fn missing_key_is_none() {
		let store = InMemoryCacheStore::default();
		assert_eq!(store.get("nope").await, None);
	}

	#[tokio::test]
	async fn incr_starts_at_one_and_accumulates() {
		let store = InMemoryCacheStore::default();
		assert_eq!(store.incr("c", Duration::from_secs(60)).await, 1);
		assert_eq!(store.incr("c", Duration::from_secs(60)).await, 2);
		assert_eq!(store.incr("c", Duration::from_secs(60)).await, 3);
	}

	#[tokio::test]
	async fn expired_entry_is_treated_as_miss() {
		let clock = Arc::new(crate::clock::FixedClock::new());
		let store = InMemoryCacheStore::new(clock.clone());
		store.set("k", Value::from(1), Duration::from_secs(10)).await;
		clock.advance(Duration::from_secs(11));
		assert_eq!(store.get("k").await, None);
	}

	#[tokio::test]
	async fn incr_resets_after_ttl_expires() {
		let clock = Arc::new(crate::clock::FixedClock::new());
		let store = InMemoryCacheStore::new(clock.clone());
		assert_eq!(store.incr("c", Duration::from_secs(10)).await, 1);
		clock.advance(Duration::from_secs(11));
		assert_eq!(store.incr("c", Duration::from_secs(10)).await, 1);
	}

	#[tokio::test]
	async fn exists_reflects_presence() {
		let store = InMemoryCacheStore::default();
		assert!(!store.exists("k").await);
		store.set("k", Value::from(true), Duration::from_secs(60)).await;
		assert!(store.exists("k").await);
	}
}
