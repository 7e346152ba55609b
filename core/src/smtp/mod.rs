use std::time::Duration;

use async_native_tls::TlsConnector;
use async_recursion::async_recursion;
use async_smtp::commands::{MailCommand, RcptCommand};
use async_smtp::smtp::client::net::{ClientTlsParameters, NetworkStream};
use async_smtp::{ClientSecurity, EmailAddress, SmtpClient, SmtpTransport};
use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::error::SmtpError;
use crate::LOG_TARGET;

/// Outcome of a single SMTP probe against one MX host (SPEC_FULL.md §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpDetails {
	pub can_connect_smtp: bool,
	pub is_deliverable: bool,
	pub is_catch_all: bool,
	pub is_disabled: bool,
	pub has_full_inbox: bool,
	pub mailbox_does_not_exist: bool,
	pub mailbox_disabled: bool,
	pub mailbox_full: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpProbeOptions {
	pub from_email: String,
	pub hello_name: String,
	pub port: u16,
	pub command_timeout: Duration,
	pub global_timeout: Duration,
	pub retries: u32,
}

impl Default for SmtpProbeOptions {
	fn default() -> Self {
		SmtpProbeOptions {
			from_email: "verify@example.org".to_string(),
			hello_name: "example.org".to_string(),
			port: 25,
			command_timeout: Duration::from_secs(10),
			global_timeout: Duration::from_secs(15),
			retries: 2,
		}
	}
}

const DISABLED_SUBSTRINGS: &[&str] = &["disabled", "discontinued", "account has been suspended"];
const FULL_INBOX_SUBSTRINGS: &[&str] = &["insufficient", "over quota", "quota exceeded", "too many messages", "mailbox full"];
const NOT_EXIST_SUBSTRINGS: &[&str] = &[
	"address rejected",
	"does not exist",
	"no such user",
	"user unknown",
	"user not found",
	"recipient rejected",
	"mailbox unavailable",
	"invalid recipient",
	"no mailbox here by that name",
	"unknown recipient",
	"mailbox not found",
];

fn classify_rejection(message: &str) -> (bool, bool, bool) {
	let lower = message.to_lowercase();
	let disabled = DISABLED_SUBSTRINGS.iter().any(|s| lower.contains(s));
	let full = FULL_INBOX_SUBSTRINGS.iter().any(|s| lower.contains(s));
	let missing = NOT_EXIST_SUBSTRINGS.iter().any(|s| lower.contains(s));
	(disabled, full, missing)
}

/// Opens one connection to `mx_host` and drives HELO -> MAIL FROM -> RCPT TO
/// for `to_email`, returning whether the recipient was accepted and, if
/// not, why. A fresh connection is used per call so probes never leak state
/// between each other.
async fn dialogue(mx_host: &str, to_email: &str, opts: &SmtpProbeOptions) -> Result<SmtpDetails, SmtpError> {
	let from = EmailAddress::new(opts.from_email.clone())
		.map_err(|e| SmtpError::Protocol(format!("invalid from_email: {e}")))?;
	let to = EmailAddress::new(to_email.to_string())
		.map_err(|e| SmtpError::Protocol(format!("invalid to_email: {e}")))?;

	let tls_params = ClientTlsParameters::new(mx_host.to_string(), TlsConnector::new().use_sni(true));

	let client = SmtpClient::with_security((mx_host, opts.port), ClientSecurity::Opportunistic(tls_params))
		.hello_name(async_smtp::ClientId::Domain(opts.hello_name.clone()));

	let mut transport: SmtpTransport<NetworkStream> = client.into_transport();

	let connect = timeout(opts.command_timeout, transport.connect()).await;
	match connect {
		Ok(Ok(())) => {}
		Ok(Err(e)) => {
			return Err(SmtpError::Connect {
				host: mx_host.to_string(),
				source: e.to_string(),
			})
		}
		Err(_) => return Err(SmtpError::Timeout(opts.command_timeout)),
	}

	let mail_result = timeout(opts.command_timeout, transport.command(MailCommand::new(Some(from), vec![]))).await;
	let mail_response = match mail_result {
		Ok(Ok(r)) => r,
		Ok(Err(e)) => {
			let _ = transport.abort().await;
			return Err(SmtpError::Protocol(format!("MAIL FROM failed: {e}")));
		}
		Err(_) => {
			let _ = transport.abort().await;
			return Err(SmtpError::Timeout(opts.command_timeout));
		}
	};
	if !mail_response.is_positive() {
		let _ = transport.abort().await;
		return Err(SmtpError::Protocol(format!(
			"MAIL FROM rejected: {}",
			mail_response.message().collect::<Vec<_>>().join(" ")
		)));
	}

	let rcpt_result = timeout(opts.command_timeout, transport.command(RcptCommand::new(to, vec![]))).await;
	let rcpt_response = match rcpt_result {
		Ok(Ok(r)) => r,
		Ok(Err(e)) => {
			let _ = transport.abort().await;
			return Err(SmtpError::Protocol(format!("RCPT TO failed: {e}")));
		}
		Err(_) => {
			let _ = transport.abort().await;
			return Err(SmtpError::Timeout(opts.command_timeout));
		}
	};

	let _ = transport.close().await;

	if rcpt_response.is_positive() {
		return Ok(SmtpDetails {
			can_connect_smtp: true,
			is_deliverable: true,
			..Default::default()
		});
	}

	let message = rcpt_response.message().collect::<Vec<_>>().join(" ");
	log::debug!(target: LOG_TARGET, "{mx_host} rejected recipient for {to_email}: {message}");
	let (disabled, full, missing) = classify_rejection(&message);

	Ok(SmtpDetails {
		can_connect_smtp: true,
		is_deliverable: false,
		is_disabled: disabled,
		has_full_inbox: full,
		mailbox_does_not_exist: missing,
		mailbox_disabled: disabled,
		mailbox_full: full,
		..Default::default()
	})
}

/// Retries a dialogue on transient failures (connection errors, timeouts)
/// up to `opts.retries` times -- mitigates greylisting, where a server
/// temporarily 4xx's the first attempt from an unfamiliar sender.
#[async_recursion]
async fn retry(mx_host: &str, to_email: &str, opts: &SmtpProbeOptions, attempt: u32) -> Result<SmtpDetails, SmtpError> {
	match dialogue(mx_host, to_email, opts).await {
		Ok(details) => Ok(details),
		Err(e @ (SmtpError::Connect { .. } | SmtpError::Timeout(_))) if attempt < opts.retries => {
			log::debug!(target: LOG_TARGET, "retrying smtp probe against {mx_host} for {to_email} after: {e}");
			retry(mx_host, to_email, opts, attempt + 1).await
		}
		Err(e) => Err(e),
	}
}

/// Probes `to_email` against `mx_host`, bounding the whole dialogue
/// (including retries) by `opts.global_timeout`.
pub async fn probe(mx_host: &str, to_email: &str, opts: &SmtpProbeOptions) -> Result<SmtpDetails, SmtpError> {
	match timeout(opts.global_timeout, retry(mx_host, to_email, opts, 0)).await {
		Ok(result) => result,
		Err(_) => Err(SmtpError::Timeout(opts.global_timeout)),
	}
}

/// Builds a random local part of at least 10 characters, used both as the
/// catch-all probe address and (implicitly) as evidence that a server
/// accepting it is accepting everything.
fn random_local_part() -> String {
	let mut rng = SmallRng::from_entropy();
	(0..15).map(|_| rng.sample(Alphanumeric) as char).collect()
}

/// Probes a pseudo-random mailbox at the same domain as `to_email`; if the
/// server accepts it too, the domain is a catch-all and `to_email`'s own
/// acceptance carries no information.
pub async fn probe_catch_all(mx_host: &str, to_domain: &str, opts: &SmtpProbeOptions) -> Result<bool, SmtpError> {
	let probe_address = format!("{}@{}", random_local_part(), to_domain);
	log::debug!(target: LOG_TARGET, "probing catch-all with generated address {probe_address}");
	let details = probe(mx_host, &probe_address, opts).await?;
	Ok(details.is_deliverable)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_user_unknown_as_missing() {
		let (disabled, full, missing) = classify_rejection("550 5.1.1 User unknown");
		assert!(!disabled);
		assert!(!full);
		assert!(missing);
	}

	#[test]
	fn classifies_quota_as_full_inbox() {
		let (_, full, _) = classify_rejection("452 4.2.2 The email account has exceeded its quota");
		assert!(full);
	}

	#[test]
	fn classifies_disabled_account() {
		let (disabled, _, _) = classify_rejection("550 5.2.1 The email account that you tried to reach is disabled");
		assert!(disabled);
	}

	#[test]
	fn random_local_part_is_fifteen_chars() {
		let local = random_local_part();
		assert_eq!(local.chars().count(), 15);
		assert!(local.chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn random_local_part_is_not_constant() {
		assert_ne!(random_local_part(), random_local_part());
	}
}
