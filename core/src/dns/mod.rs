use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

use crate::cache::CacheStore;
use crate::error::DnsError;
use crate::LOG_TARGET;

/// A single MX answer: `{exchange, priority}` (see SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MxRecord {
	pub exchange: String,
	pub priority: u16,
}

/// A zone's start-of-authority record, used by the Enricher to approximate
/// domain age via the serial number's refresh/expire cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoaRecord {
	pub mname: String,
	pub rname: String,
	pub serial: u32,
	pub refresh: i32,
	pub expire: i32,
}

/// DNS operations consumed by the Verifier Pipeline (§4.2). `ns` and `soa`
/// are uncached at this layer -- only MX lookups are worth the 24h cache,
/// since they are the only record queried on every `verify` call.
#[async_trait]
pub trait DnsResolver: Send + Sync {
	/// `alt_dns` gates the single retry against the secondary resolver pool
	/// on timeout/transient failure (SPEC_FULL.md §4.2, `VerifyOptions::alt_dns`).
	async fn mx(&self, domain: &str, alt_dns: bool) -> Result<Vec<MxRecord>, DnsError>;
	async fn txt(&self, domain: &str) -> Result<Vec<Vec<String>>, DnsError>;
	async fn ns(&self, domain: &str) -> Result<Vec<String>, DnsError>;
	async fn soa(&self, domain: &str) -> Result<SoaRecord, DnsError>;
}

/// `trust-dns-resolver`-backed implementation with a primary resolver (the
/// process's configured nameservers) and a secondary pool used as a single
/// retry on timeout or SERVFAIL, plus a 24h MX cache.
pub struct TrustDnsMxResolver {
	primary: TokioAsyncResolver,
	secondary: Option<TokioAsyncResolver>,
	cache: Arc<dyn CacheStore>,
	mx_ttl: Duration,
}

impl TrustDnsMxResolver {
	pub fn new(
		secondary_servers: &[String],
		timeout: Duration,
		cache: Arc<dyn CacheStore>,
		mx_ttl: Duration,
	) -> Result<Self, DnsError> {
		let primary = TokioAsyncResolver::tokio(
			ResolverConfig::default(),
			resolver_opts(timeout),
		);

		let secondary = if secondary_servers.is_empty() {
			None
		} else {
			let mut conf = ResolverConfig::new();
			for server in secondary_servers {
				if let Ok(addr) = server.parse() {
					conf.add_name_server(NameServerConfig {
						socket_addr: addr,
						protocol: Protocol::Udp,
						tls_dns_name: None,
						trust_negative_responses: false,
						bind_addr: None,
					});
					conf.add_name_server(NameServerConfig {
						socket_addr: addr,
						protocol: Protocol::Tcp,
						tls_dns_name: None,
						trust_negative_responses: false,
						bind_addr: None,
					});
				}
			}
			Some(TokioAsyncResolver::tokio(conf, resolver_opts(Duration::from_secs(5))))
		};

		Ok(TrustDnsMxResolver {
			primary,
			secondary,
			cache,
			mx_ttl,
		})
	}

	fn cache_key(domain: &str) -> String {
		format!("dns:mx:{}", domain.to_lowercase())
	}

	async fn mx_uncached(&self, domain: &str, alt_dns: bool) -> Result<Vec<MxRecord>, DnsError> {
		match self.primary.mx_lookup(domain).await {
			Ok(lookup) => Ok(sorted_records(lookup.iter().map(|r| MxRecord {
				exchange: r.exchange().to_utf8(),
				priority: r.preference(),
			}))),
			Err(e) => {
				let classified = classify(domain, &e);
				if alt_dns && matches!(classified, DnsError::Timeout(..) | DnsError::Transient(..)) {
					if let Some(secondary) = &self.secondary {
						log::warn!(target: LOG_TARGET, "primary dns failed for {domain} ({classified}), retrying against secondary resolvers");
						return match secondary.mx_lookup(domain).await {
							Ok(lookup) => Ok(sorted_records(lookup.iter().map(|r| MxRecord {
								exchange: r.exchange().to_utf8(),
								priority: r.preference(),
							}))),
							Err(e2) => Err(classify(domain, &e2)),
						};
					}
				}
				Err(classified)
			}
		}
	}
}

fn resolver_opts(timeout: Duration) -> ResolverOpts {
	let mut opts = ResolverOpts::default();
	opts.timeout = timeout;
	opts.attempts = 2;
	opts
}

fn sorted_records(iter: impl Iterator<Item = MxRecord>) -> Vec<MxRecord> {
	let mut records: Vec<MxRecord> = iter.collect();
	records.sort_by_key(|r| r.priority);
	records
}

fn classify(domain: &str, e: &trust_dns_resolver::error::ResolveError) -> DnsError {
	match e.kind() {
		ResolveErrorKind::NoRecordsFound { .. } => DnsError::NoRecords(domain.to_string()),
		ResolveErrorKind::Timeout => DnsError::Timeout(domain.to_string(), Duration::from_secs(5)),
		_ => {
			let msg = format!("{:?}", e.kind());
			if msg.contains("NXDOMAIN") {
				DnsError::DomainNotFound(domain.to_string())
			} else {
				DnsError::Transient(domain.to_string(), msg)
			}
		}
	}
}

#[async_trait]
impl DnsResolver for TrustDnsMxResolver {
	async fn mx(&self, domain: &str, alt_dns: bool) -> Result<Vec<MxRecord>, DnsError> {
		let key = Self::cache_key(domain);
		if let Some(cached) = self.cache.get(&key).await {
			if let Ok(records) = serde_json::from_value::<Vec<MxRecord>>(cached) {
				return Ok(records);
			}
		}

		let records = self.mx_uncached(domain, alt_dns).await?;
		self.cache.set(&key, json!(records), self.mx_ttl).await;
		Ok(records)
	}

	async fn txt(&self, domain: &str) -> Result<Vec<Vec<String>>, DnsError> {
		match self.primary.txt_lookup(domain).await {
			Ok(lookup) => Ok(lookup
				.iter()
				.map(|txt| txt.iter().map(|chunk| String::from_utf8_lossy(chunk).to_string()).collect())
				.collect()),
			Err(e) => Err(classify(domain, &e)),
		}
	}

	async fn ns(&self, domain: &str) -> Result<Vec<String>, DnsError> {
		match self.primary.ns_lookup(domain).await {
			Ok(lookup) => Ok(lookup.iter().map(|ns| ns.to_utf8()).collect()),
			Err(e) => Err(classify(domain, &e)),
		}
	}

	async fn soa(&self, domain: &str) -> Result<SoaRecord, DnsError> {
		match self.primary.soa_lookup(domain).await {
			Ok(lookup) => lookup
				.iter()
				.next()
				.map(|soa| SoaRecord {
					mname: soa.mname().to_utf8(),
					rname: soa.rname().to_utf8(),
					serial: soa.serial(),
					refresh: soa.refresh(),
					expire: soa.expire(),
				})
				.ok_or_else(|| DnsError::NoRecords(domain.to_string())),
			Err(e) => Err(classify(domain, &e)),
		}
	}
}
