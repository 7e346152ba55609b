use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::cache::CacheStore;
use crate::config::RateLimitConfig;
use crate::error::EngineError;
use crate::LOG_TARGET;

/// Outcome of [`RateGovernor::acquire`]: either a sending IP, or which
/// window was exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
	RateLimitMinute,
	RateLimitHour,
}

impl std::fmt::Display for AcquireError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			AcquireError::RateLimitMinute => write!(f, "rate limit exceeded (per-minute window)"),
			AcquireError::RateLimitHour => write!(f, "rate limit exceeded (per-hour window)"),
		}
	}
}

impl From<AcquireError> for EngineError {
	fn from(e: AcquireError) -> Self {
		EngineError::PolicyDenial {
			domain: String::new(),
			reason: e.to_string(),
		}
	}
}

/// Guards outbound SMTP: per-domain sliding-window counters, progressive
/// pre-send delay, IP-pool round-robin, and a block/quarantine list
/// (SPEC_FULL.md §4.4). Implementations must fail open if their backing
/// cache is unavailable.
#[async_trait]
pub trait RateGovernor: Send + Sync {
	async fn acquire(&self, domain: &str) -> Result<String, AcquireError>;
	async fn delay(&self, domain: &str) -> Duration;
	async fn mark_blocked(&self, domain: &str, seconds: u64);
	async fn is_blocked(&self, domain: &str) -> bool;
	async fn report_success(&self, domain: &str);
	async fn report_failure(&self, domain: &str, reason: &str);
}

const DEFAULT_IP: &str = "0.0.0.0";

pub struct CacheBackedGovernor {
	cache: Arc<dyn CacheStore>,
	limits: RateLimitConfig,
	ip_pool: Vec<String>,
}

impl CacheBackedGovernor {
	pub fn new(cache: Arc<dyn CacheStore>, limits: RateLimitConfig, ip_pool: Vec<String>) -> Self {
		CacheBackedGovernor { cache, limits, ip_pool }
	}

	fn limits_for(&self, domain: &str) -> crate::config::RateLimit {
		self.limits
			.overrides
			.get(domain)
			.copied()
			.unwrap_or(self.limits.default)
	}

	async fn next_ip(&self) -> String {
		if self.ip_pool.is_empty() {
			return DEFAULT_IP.to_string();
		}
		let idx = self.cache.incr("smtp:ip_index", Duration::from_secs(3600)).await as usize;
		self.ip_pool[idx % self.ip_pool.len()].clone()
	}
}

#[async_trait]
impl RateGovernor for CacheBackedGovernor {
	async fn acquire(&self, domain: &str) -> Result<String, AcquireError> {
		let limits = self.limits_for(domain);

		let minute_count = self
			.cache
			.incr(&format!("smtp:{domain}:minute"), Duration::from_secs(60))
			.await;
		if minute_count > limits.per_minute as u64 {
			log::info!(target: LOG_TARGET, "domain {domain} exceeded per-minute rate limit ({minute_count}/{})", limits.per_minute);
			return Err(AcquireError::RateLimitMinute);
		}

		let hour_count = self
			.cache
			.incr(&format!("smtp:{domain}:hour"), Duration::from_secs(3600))
			.await;
		if hour_count > limits.per_hour as u64 {
			log::info!(target: LOG_TARGET, "domain {domain} exceeded per-hour rate limit ({hour_count}/{})", limits.per_hour);
			return Err(AcquireError::RateLimitHour);
		}

		Ok(self.next_ip().await)
	}

	async fn delay(&self, domain: &str) -> Duration {
		let limits = self.limits_for(domain);
		let key = format!("smtp:{domain}:minute");
		let current = match self.cache.get(&key).await {
			Some(v) => v.as_u64().unwrap_or(0),
			None => return Duration::ZERO,
		};

		let ratio = current as f64 / limits.per_minute.max(1) as f64;
		if ratio <= 0.8 {
			return Duration::ZERO;
		}
		let secs = (ratio - 0.8) * 10.0;
		Duration::from_secs_f64(secs.max(0.0))
	}

	async fn mark_blocked(&self, domain: &str, seconds: u64) {
		self.cache
			.set(&format!("smtp:blocked:{domain}"), json!(true), Duration::from_secs(seconds))
			.await;
	}

	async fn is_blocked(&self, domain: &str) -> bool {
		self.cache.exists(&format!("smtp:blocked:{domain}")).await
	}

	async fn report_success(&self, domain: &str) {
		self.cache
			.incr(&format!("smtp:{domain}:success"), Duration::from_secs(3600))
			.await;
	}

	async fn report_failure(&self, domain: &str, reason: &str) {
		log::debug!(target: LOG_TARGET, "smtp failure for {domain}: {reason}");
		self.cache
			.incr(&format!("smtp:{domain}:failure"), Duration::from_secs(3600))
			.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::InMemoryCacheStore;

	fn governor_with_limit(per_minute: u32, per_hour: u32) -> CacheBackedGovernor {
		let cache = Arc::new(InMemoryCacheStore::default());
		let mut limits = RateLimitConfig::default();
		limits.default.per_minute = per_minute;
		limits.default.per_hour = per_hour;
		CacheBackedGovernor::new(cache, limits, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()])
	}

	#[tokio::test]
	async fn acquire_succeeds_under_limit() {
		let gov = governor_with_limit(100, 2000);
		for _ in 0..100 {
			assert!(gov.acquire("gmail.com").await.is_ok());
		}
	}

	#[tokio::test]
	async fn acquire_101st_call_hits_minute_limit() {
		let gov = governor_with_limit(100, 2000);
		for _ in 0..100 {
			gov.acquire("gmail.com").await.unwrap();
		}
		assert_eq!(gov.acquire("gmail.com").await, Err(AcquireError::RateLimitMinute));
	}

	#[tokio::test]
	async fn ip_pool_round_robins() {
		let gov = governor_with_limit(100, 2000);
		let ip1 = gov.acquire("example.com").await.unwrap();
		let ip2 = gov.acquire("example.com").await.unwrap();
		assert_ne!(ip1, ip2);
	}

	#[tokio::test]
	async fn blocked_domain_is_reported() {
		let gov = governor_with_limit(100, 2000);
		assert!(!gov.is_blocked("bad.example").await);
		gov.mark_blocked("bad.example", 60).await;
		assert!(gov.is_blocked("bad.example").await);
	}

	#[tokio::test]
	async fn delay_is_zero_under_80_percent_usage() {
		let gov = governor_with_limit(100, 2000);
		gov.acquire("example.com").await.unwrap();
		assert_eq!(gov.delay("example.com").await, Duration::ZERO);
	}

	#[tokio::test]
	async fn delay_grows_past_80_percent_usage() {
		let gov = governor_with_limit(10, 2000);
		for _ in 0..9 {
			gov.acquire("example.com").await.unwrap();
		}
		assert!(gov.delay("example.com").await > Duration::ZERO);
	}
}
