use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The closed error taxonomy for the verification engine.
///
/// Every failure that can reach a caller of [`crate::pipeline`] or
/// [`crate::batch`] is one of these five kinds. Component-level errors
/// (`DnsError`, `SmtpError`, `CacheError`) convert into this type at the
/// boundary where a component result is folded into a pipeline step.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("invalid input: {0}")]
	Input(String),

	#[error("policy denial for domain {domain}: {reason}")]
	PolicyDenial { domain: String, reason: String },

	#[error("transient failure: {0}")]
	Transient(String),

	#[error("permanent failure: {0}")]
	Permanent(String),

	#[error("fatal engine error (correlation={1}): {0}")]
	Fatal(String, String),
}

impl EngineError {
	pub fn fatal(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
		EngineError::Fatal(message.into(), correlation_id.into())
	}
}

/// DNS resolution failures (see §4.2).
#[derive(Debug, Error)]
pub enum DnsError {
	#[error("domain not found: {0}")]
	DomainNotFound(String),
	#[error("no records for {0}")]
	NoRecords(String),
	#[error("dns lookup for {0} timed out after {1:?}")]
	Timeout(String, Duration),
	#[error("transient dns failure for {0}: {1}")]
	Transient(String, String),
}

impl From<DnsError> for EngineError {
	fn from(e: DnsError) -> Self {
		match e {
			DnsError::DomainNotFound(d) => EngineError::Permanent(format!("no MX records found for domain {d}")),
			DnsError::NoRecords(d) => EngineError::Permanent(format!("no MX records found for domain {d}")),
			DnsError::Timeout(d, t) => EngineError::Transient(format!("dns timeout for {d} after {t:?}")),
			DnsError::Transient(d, r) => EngineError::Transient(format!("transient dns error for {d}: {r}")),
		}
	}
}

/// SMTP probe failures (see §4.5).
#[derive(Debug, Error)]
pub enum SmtpError {
	#[error("could not connect to {host}: {source}")]
	Connect { host: String, source: String },
	#[error("smtp operation timed out after {0:?}")]
	Timeout(Duration),
	#[error("smtp server rejected the recipient: {0}")]
	Rejected(String),
	#[error("unexpected smtp protocol response: {0}")]
	Protocol(String),
}

impl From<SmtpError> for EngineError {
	fn from(e: SmtpError) -> Self {
		match e {
			SmtpError::Connect { host, source } => {
				EngineError::Transient(format!("could not connect to {host}: {source}"))
			}
			SmtpError::Timeout(t) => EngineError::Transient(format!("smtp timeout after {t:?}")),
			SmtpError::Rejected(reason) => EngineError::Permanent(reason),
			SmtpError::Protocol(reason) => EngineError::Transient(reason),
		}
	}
}

/// Cache backend failures. These never propagate past [`crate::cache`] --
/// callers degrade to miss semantics and log a warning instead.
#[derive(Debug, Error)]
pub struct CacheError(pub String);

impl fmt::Display for CacheError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "cache backend error: {}", self.0)
	}
}
