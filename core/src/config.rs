use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::LOG_TARGET;

/// Per-domain (or default) rate limits enforced by the [`crate::governor`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimit {
	pub per_minute: u32,
	pub per_hour: u32,
}

impl Default for RateLimit {
	fn default() -> Self {
		RateLimit {
			per_minute: 100,
			per_hour: 2000,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
	pub default: RateLimit,
	pub overrides: HashMap<String, RateLimit>,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		RateLimitConfig {
			default: RateLimit::default(),
			overrides: HashMap::new(),
		}
	}
}

/// The full configuration surface of the engine (see SPEC_FULL.md §6).
///
/// Unknown keys in a loaded config file are rejected rather than ignored,
/// so a typo in an operator's config surfaces at startup, not at 3am.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
	pub redis_url: Option<String>,
	pub ip_pool: Vec<String>,
	pub queue_prefix: String,
	pub verification_concurrency: usize,
	pub bulk_concurrency: usize,
	pub allowed_origins: Vec<String>,
	pub log_level: String,
	pub enable_metrics: bool,

	pub from_email: String,
	pub hello_name: String,
	pub smtp_port: u16,
	pub smtp_timeout_ms: u64,
	pub smtp_retries: u32,

	pub dns_timeout_ms: u64,
	pub dns_servers: Vec<String>,

	pub rate_limits: RateLimitConfig,

	pub cache_ttl_mx_secs: u64,
	pub cache_ttl_positive_secs: u64,
	pub cache_ttl_negative_secs: u64,

	/// If true (the default, matching the source's behaviour) a domain
	/// blocked by the rate governor is treated as a positive signal for
	/// `is_valid` rather than a failure, to avoid false negatives caused
	/// purely by our own outbound throttling.
	pub treat_policy_block_as_valid: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		EngineConfig {
			redis_url: None,
			ip_pool: Vec::new(),
			queue_prefix: "mailverify".to_string(),
			verification_concurrency: 20,
			bulk_concurrency: 5,
			allowed_origins: Vec::new(),
			log_level: "info".to_string(),
			enable_metrics: false,

			from_email: "verify@example.org".to_string(),
			hello_name: "example.org".to_string(),
			smtp_port: 25,
			smtp_timeout_ms: 10_000,
			smtp_retries: 2,

			dns_timeout_ms: 5_000,
			dns_servers: vec![
				"8.8.8.8:53".to_string(),
				"1.1.1.1:53".to_string(),
				"9.9.9.9:53".to_string(),
			],

			rate_limits: RateLimitConfig::default(),

			cache_ttl_mx_secs: 24 * 3600,
			cache_ttl_positive_secs: 24 * 3600,
			cache_ttl_negative_secs: 12 * 3600,

			treat_policy_block_as_valid: true,
		}
	}
}

impl EngineConfig {
	/// Clamps out-of-range values to documented defaults and logs a warning,
	/// rather than failing startup outright. Always run before a config is
	/// handed to the pipeline.
	pub fn validate(mut self) -> Self {
		if self.verification_concurrency == 0 {
			log::warn!(target: LOG_TARGET, "verification_concurrency was 0, clamping to 20");
			self.verification_concurrency = 20;
		}
		if self.bulk_concurrency == 0 {
			log::warn!(target: LOG_TARGET, "bulk_concurrency was 0, clamping to 5");
			self.bulk_concurrency = 5;
		}
		if self.smtp_port == 0 {
			log::warn!(target: LOG_TARGET, "smtp_port was 0, clamping to 25");
			self.smtp_port = 25;
		}
		if self.smtp_timeout_ms == 0 {
			log::warn!(target: LOG_TARGET, "smtp_timeout_ms was 0, clamping to 10000");
			self.smtp_timeout_ms = 10_000;
		}
		if self.dns_timeout_ms == 0 {
			log::warn!(target: LOG_TARGET, "dns_timeout_ms was 0, clamping to 5000");
			self.dns_timeout_ms = 5_000;
		}
		if self.rate_limits.default.per_minute == 0 {
			log::warn!(target: LOG_TARGET, "rate_limits.default.per_minute was 0, clamping to 100");
			self.rate_limits.default.per_minute = 100;
		}
		if self.rate_limits.default.per_hour < self.rate_limits.default.per_minute {
			log::warn!(
				target: LOG_TARGET,
				"rate_limits.default.per_hour smaller than per_minute, raising to {}x per_minute",
				20
			);
			self.rate_limits.default.per_hour = self.rate_limits.default.per_minute * 20;
		}
		self
	}

	pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
		let cfg: EngineConfig = toml::from_str(s)?;
		Ok(cfg.validate())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_is_already_valid() {
		let cfg = EngineConfig::default();
		let validated = cfg.clone().validate();
		assert_eq!(validated.verification_concurrency, cfg.verification_concurrency);
		assert_eq!(validated.smtp_port, cfg.smtp_port);
	}

	#[test]
	fn validate_clamps_zero_concurrency() {
		let mut cfg = EngineConfig::default();
		cfg.verification_concurrency = 0;
		cfg.bulk_concurrency = 0;
		let cfg = cfg.validate();
		assert_eq!(cfg.verification_concurrency, 20);
		assert_eq!(cfg.bulk_concurrency, 5);
	}

	#[test]
	fn rejects_unknown_fields() {
		let toml_str = r#"
			log_level = "debug"
			bogus_field = true
		"#;
		assert!(EngineConfig::from_toml_str(toml_str).is_err());
	}
}
