pub mod options;
pub mod result;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dns::{DnsResolver, MxRecord};
use crate::error::DnsError;
use crate::governor::RateGovernor;
use crate::policy::DomainPolicy;
use crate::smtp::{self, SmtpProbeOptions};
use crate::syntax::check_syntax;
use crate::util::constants::ROLE_ACCOUNT_LOCAL_PARTS;
use crate::LOG_TARGET;

pub use options::{VerifyOptions, VerifyOptionsBuilder};
pub use result::{Reachable, VerificationDetails, VerificationResult};

fn cache_key(email: &str) -> String {
	format!("verify:{}", email.to_lowercase())
}

fn is_role_account(local_part: &str) -> bool {
	let local = local_part.to_lowercase();
	ROLE_ACCOUNT_LOCAL_PARTS.iter().any(|r| *r == local)
}

static SPAM_TRAP_LOCAL_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[a-z0-9]{8,}$").expect("static pattern"));
static SPAM_TRAP_TXT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)spam|trap|honeypot").expect("static pattern"));

fn dns_error_tag(e: &DnsError) -> String {
	match e {
		DnsError::DomainNotFound(d) | DnsError::NoRecords(d) => format!("No MX records found for domain {d}"),
		DnsError::Timeout(d, _) => format!("DNS lookup for {d} timed out"),
		DnsError::Transient(d, reason) => format!("Transient DNS error for {d}: {reason}"),
	}
}

/// Orchestrates syntax -> DNS -> disposable -> rate-governed SMTP ->
/// catch-all -> spam-trap into a single [`VerificationResult`]
/// (SPEC_FULL.md §4.6). Never throws: every branch either advances the
/// pipeline or records an error tag and moves on.
pub struct VerifierPipeline {
	cache: Arc<dyn CacheStore>,
	dns: Arc<dyn DnsResolver>,
	governor: Arc<dyn RateGovernor>,
	policy: DomainPolicy,
	config: EngineConfig,
	clock: Arc<dyn Clock>,
}

impl VerifierPipeline {
	pub fn new(
		cache: Arc<dyn CacheStore>,
		dns: Arc<dyn DnsResolver>,
		governor: Arc<dyn RateGovernor>,
		config: EngineConfig,
		clock: Arc<dyn Clock>,
	) -> Self {
		VerifierPipeline {
			cache,
			dns,
			governor,
			policy: DomainPolicy,
			config,
			clock,
		}
	}

	fn remaining(&self, start: std::time::Instant, total: Duration) -> Duration {
		let elapsed = self.clock.now().saturating_duration_since(start);
		total.saturating_sub(elapsed)
	}

	fn empty_result(&self, email: &str) -> VerificationResult {
		VerificationResult {
			email: email.to_string(),
			domain: String::new(),
			timestamp: Utc::now(),
			processing_ms: 0,
			format_valid: false,
			has_mx: false,
			is_disposable: false,
			is_catch_all: false,
			is_role_account: false,
			is_spam_trap: false,
			smtp_ok: false,
			smtp_blocked_by_policy: false,
			suggestion: None,
			errors: Vec::new(),
			details: VerificationDetails::default(),
			reachable: Reachable::Invalid,
			is_valid: false,
			is_live: false,
			from_cache: false,
		}
	}

	/// Heuristic: an all-lowercase-alphanumeric local part of 8+ characters
	/// with no vowels is an immediate trap signal; otherwise falls back to
	/// scanning the domain's TXT records (already fetched for SPF/DKIM/DMARC
	/// presence) for a trap/honeypot keyword.
	fn looks_like_spam_trap(local_part: &str, txt_records: &[Vec<String>]) -> bool {
		let no_vowels = !local_part.chars().any(|c| "aeiouAEIOU".contains(c));
		if SPAM_TRAP_LOCAL_PATTERN.is_match(local_part) && no_vowels {
			return true;
		}
		txt_records.iter().flatten().any(|chunk| SPAM_TRAP_TXT_PATTERN.is_match(chunk))
	}

	/// Derives SPF/DKIM/DMARC presence from the domain's own TXT records plus
	/// its `_dmarc` subdomain. Lookup errors are non-fatal -- an absent
	/// record and a failed query both present as "not found".
	async fn dns_policy_flags(&self, domain: &str) -> (bool, bool, bool, Vec<Vec<String>>) {
		let txt_records = self.dns.txt(domain).await.unwrap_or_default();
		let has_spf = txt_records.iter().flatten().any(|chunk| chunk.to_lowercase().starts_with("v=spf1"));
		let has_dkim = txt_records
			.iter()
			.flatten()
			.any(|chunk| chunk.to_lowercase().contains("v=dkim1"));

		let dmarc_domain = format!("_dmarc.{domain}");
		let has_dmarc = self
			.dns
			.txt(&dmarc_domain)
			.await
			.map(|records| records.iter().flatten().any(|chunk| chunk.to_lowercase().starts_with("v=dmarc1")))
			.unwrap_or(false);

		(has_spf, has_dkim, has_dmarc, txt_records)
	}

	pub async fn verify(&self, email: &str, options: &VerifyOptions) -> VerificationResult {
		let start = self.clock.now();
		let total_timeout = Duration::from_millis(options.timeout_ms);

		let syntax = if options.check_syntax {
			check_syntax(email)
		} else {
			crate::syntax::parse_loose(email)
		};
		if !syntax.is_valid_syntax {
			let mut result = self.empty_result(email);
			result.errors.push("Invalid email format".to_string());
			result.processing_ms = self.clock.now().saturating_duration_since(start).as_millis() as u64;
			result.derive_validity(self.config.treat_policy_block_as_valid);
			return result;
		}

		let domain = syntax.domain.clone().unwrap_or_default();
		let local_part = syntax.local_part.clone().unwrap_or_default();

		let mut result = self.empty_result(email);
		result.domain = domain.clone();
		result.format_valid = true;

		if options.use_cache {
			if let Some(cached) = self.cache.get(&cache_key(email)).await {
				if let Ok(mut cached_result) = serde_json::from_value::<VerificationResult>(cached) {
					cached_result.from_cache = true;
					return cached_result;
				}
			}
		}

		// §4.6 step 4 / §5: disposable, role-account, typo-suggestion and MX
		// all run as one joined future under the MX lookup's own deadline.
		let disposable_check = async {
			if options.check_disposable {
				self.policy.is_disposable(&domain)
			} else {
				false
			}
		};
		let role_account_check = async {
			if options.check_role_account {
				is_role_account(&local_part)
			} else {
				false
			}
		};
		let typo_check = async {
			if options.check_typos {
				self.policy.suggest(email)
			} else {
				None
			}
		};
		let mx_check = async {
			if options.check_mx {
				let budget = self.remaining(start, total_timeout);
				Some(tokio::time::timeout(budget, self.dns.mx(&domain, options.alt_dns)).await)
			} else {
				None
			}
		};

		let (is_disposable, role_account_flag, mut suggestion, mx_outcome) =
			tokio::join!(disposable_check, role_account_check, typo_check, mx_check);

		result.is_disposable = is_disposable;
		result.is_role_account = role_account_flag;

		if let Some(mx_result) = mx_outcome {
			match mx_result {
				Ok(Ok(records)) if !records.is_empty() => {
					result.has_mx = true;
					result.details.mx_records = records;
				}
				Ok(Ok(_)) => {
					result.has_mx = false;
					result.errors.push(format!("No MX records found for domain {domain}"));
					if suggestion.is_none() {
						suggestion = self.policy.suggest(email);
					}
				}
				Ok(Err(e)) => {
					result.has_mx = false;
					result.errors.push(dns_error_tag(&e));
					if suggestion.is_none() {
						suggestion = self.policy.suggest(email);
					}
				}
				Err(_) => {
					result.has_mx = false;
					result.errors.push("timeout".to_string());
				}
			}
		}

		result.suggestion = suggestion;

		if result.has_mx && options.check_smtp {
			self.run_smtp_checks(email, &domain, options, &mut result, start, total_timeout).await;
		}

		if result.has_mx {
			let (has_spf, has_dkim, has_dmarc, txt_records) = self.dns_policy_flags(&domain).await;
			result.details.has_spf = has_spf;
			result.details.has_dkim = has_dkim;
			result.details.has_dmarc = has_dmarc;
			if options.check_spam_trap {
				result.is_spam_trap = Self::looks_like_spam_trap(&local_part, &txt_records);
			}
		}

		result.processing_ms = self.clock.now().saturating_duration_since(start).as_millis() as u64;
		result.derive_validity(self.config.treat_policy_block_as_valid);

		if options.cache_results && options.use_cache {
			let ttl = if result.is_valid {
				Duration::from_secs(self.config.cache_ttl_positive_secs)
			} else {
				Duration::from_secs(self.config.cache_ttl_negative_secs)
			};
			self.cache.set(&cache_key(email), json!(result), ttl).await;
		}

		result
	}

	async fn run_smtp_checks(
		&self,
		email: &str,
		domain: &str,
		options: &VerifyOptions,
		result: &mut VerificationResult,
		start: std::time::Instant,
		total_timeout: Duration,
	) {
		let mx_host = match result.details.mx_records.first() {
			Some(MxRecord { exchange, .. }) => exchange.clone(),
			None => return,
		};

		if self.governor.is_blocked(domain).await {
			result.smtp_blocked_by_policy = true;
			log::debug!(target: LOG_TARGET, "domain {domain} is blocked by policy, skipping smtp probe");
			return;
		}

		let delay = self.governor.delay(domain).await;
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}

		if let Err(rate_err) = self.governor.acquire(domain).await {
			result.smtp_blocked_by_policy = true;
			result.errors.push(rate_err.to_string());
			return;
		}

		let probe_opts = SmtpProbeOptions {
			from_email: self.config.from_email.clone(),
			hello_name: self.config.hello_name.clone(),
			port: self.config.smtp_port,
			command_timeout: Duration::from_millis(self.config.smtp_timeout_ms),
			global_timeout: self.remaining(start, total_timeout).max(Duration::from_secs(1)),
			retries: self.config.smtp_retries,
		};

		match smtp::probe(&mx_host, email, &probe_opts).await {
			Ok(details) => {
				result.smtp_ok = details.is_deliverable;
				result.details.mailbox_does_not_exist = details.mailbox_does_not_exist;
				result.details.mailbox_disabled = details.mailbox_disabled;
				result.details.mailbox_full = details.mailbox_full;
				if !details.is_deliverable {
					result.errors.push("address rejected".to_string());
				}
				self.governor.report_success(domain).await;

				if options.check_catch_all && result.smtp_ok && !result.is_disposable {
					match smtp::probe_catch_all(&mx_host, domain, &probe_opts).await {
						Ok(is_catch_all) => result.is_catch_all = is_catch_all,
						Err(e) => {
							log::debug!(target: LOG_TARGET, "catch-all probe failed for {domain}, assuming not catch-all: {e}");
						}
					}
				}
			}
			Err(e) => {
				result.errors.push(e.to_string());
				self.governor.report_failure(domain, &e.to_string()).await;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::InMemoryCacheStore;
	use crate::clock::SystemClock;
	use crate::error::DnsError as CoreDnsError;
	use crate::governor::{AcquireError, RateGovernor};
	use async_trait::async_trait;

	struct StubDns {
		mx: Vec<MxRecord>,
		fail: bool,
	}

	#[async_trait]
	impl DnsResolver for StubDns {
		async fn mx(&self, _domain: &str, _alt_dns: bool) -> Result<Vec<MxRecord>, CoreDnsError> {
			if self.fail {
				Err(CoreDnsError::NoRecords("x".to_string()))
			} else {
				Ok(self.mx.clone())
			}
		}
		async fn txt(&self, _domain: &str) -> Result<Vec<Vec<String>>, CoreDnsError> {
			Ok(vec![])
		}
		async fn ns(&self, _domain: &str) -> Result<Vec<String>, CoreDnsError> {
			Ok(vec![])
		}
		async fn soa(&self, domain: &str) -> Result<crate::dns::SoaRecord, CoreDnsError> {
			Err(CoreDnsError::NoRecords(domain.to_string()))
		}
	}

	struct AlwaysBlockedGovernor;

	#[async_trait]
	impl RateGovernor for AlwaysBlockedGovernor {
		async fn acquire(&self, _domain: &str) -> Result<String, AcquireError> {
			Ok("0.0.0.0".to_string())
		}
		async fn delay(&self, _domain: &str) -> Duration {
			Duration::ZERO
		}
		async fn mark_blocked(&self, _domain: &str, _seconds: u64) {}
		async fn is_blocked(&self, _domain: &str) -> bool {
			true
		}
		async fn report_success(&self, _domain: &str) {}
		async fn report_failure(&self, _domain: &str, _reason: &str) {}
	}

	fn pipeline_with(dns: StubDns) -> VerifierPipeline {
		VerifierPipeline::new(
			Arc::new(InMemoryCacheStore::default()),
			Arc::new(dns),
			Arc::new(AlwaysBlockedGovernor),
			EngineConfig::default(),
			Arc::new(SystemClock),
		)
	}

	#[tokio::test]
	async fn skips_rfc_lite_check_when_check_syntax_disabled() {
		let pipeline = pipeline_with(StubDns { mx: vec![], fail: false });
		let options = VerifyOptionsBuilder::default().check_syntax(false).build().unwrap();
		let result = pipeline.verify("a..b@-example.com", &options).await;
		assert!(result.format_valid);
	}

	#[tokio::test]
	async fn rejects_malformed_address() {
		let pipeline = pipeline_with(StubDns { mx: vec![], fail: false });
		let result = pipeline.verify("not-an-email", &VerifyOptions::default()).await;
		assert!(!result.format_valid);
		assert!(!result.is_valid);
		assert!(result.errors.contains(&"Invalid email format".to_string()));
	}

	#[tokio::test]
	async fn detects_disposable_domain() {
		let pipeline = pipeline_with(StubDns {
			mx: vec![MxRecord { exchange: "mx.mailinator.com".to_string(), priority: 10 }],
			fail: false,
		});
		let result = pipeline.verify("user@mailinator.com", &VerifyOptions::default()).await;
		assert!(result.is_disposable);
		assert!(!result.is_valid);
	}

	#[tokio::test]
	async fn no_mx_records_marks_invalid() {
		let pipeline = pipeline_with(StubDns { mx: vec![], fail: false });
		let result = pipeline.verify("x@invalid-domain.example", &VerifyOptions::default()).await;
		assert!(!result.has_mx);
		assert!(!result.is_valid);
		assert!(result.errors.iter().any(|e| e.contains("No MX records found")));
	}

	#[tokio::test]
	async fn blocked_domain_counts_as_valid_by_default() {
		let pipeline = pipeline_with(StubDns {
			mx: vec![MxRecord { exchange: "mx.example.com".to_string(), priority: 10 }],
			fail: false,
		});
		let result = pipeline.verify("person@example.com", &VerifyOptions::default()).await;
		assert!(result.smtp_blocked_by_policy);
		assert!(result.is_valid);
	}

	#[tokio::test]
	async fn cached_result_is_returned_without_recomputation() {
		let cache = Arc::new(InMemoryCacheStore::default());
		let pipeline = VerifierPipeline::new(
			cache.clone(),
			Arc::new(StubDns { mx: vec![], fail: false }),
			Arc::new(AlwaysBlockedGovernor),
			EngineConfig::default(),
			Arc::new(SystemClock),
		);
		let first = pipeline.verify("x@invalid-domain.example", &VerifyOptions::default()).await;
		assert!(!first.from_cache);
		let second = pipeline.verify("x@invalid-domain.example", &VerifyOptions::default()).await;
		assert!(second.from_cache);
		assert_eq!(first.is_valid, second.is_valid);
	}
}
