use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dns::MxRecord;

/// The coarse, four-way triage a caller reaches for before reading the
/// detailed signals on [`VerificationResult`] (SPEC_FULL.md §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Reachable {
	/// Valid, with no risk flags raised.
	Safe,
	/// Valid, but disposable, role-based, catch-all, or suspected spam trap.
	Risky,
	/// Format invalid, no MX, or SMTP hard-rejected the recipient.
	Invalid,
	/// A transient or timeout error prevented a confident verdict.
	Unknown,
}

/// Nested detail fields that support `VerificationResult` without cluttering
/// its top-level booleans (SPEC_FULL.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerificationDetails {
	pub mx_records: Vec<MxRecord>,
	pub has_spf: bool,
	pub has_dkim: bool,
	pub has_dmarc: bool,
	pub mailbox_does_not_exist: bool,
	pub mailbox_disabled: bool,
	pub mailbox_full: bool,
	/// 0-10 heuristic reputation score; currently derived only from the
	/// risk flags already present on the result (no external lookups).
	pub reputation_score: u8,
}

/// The engine's primary output for a single address (SPEC_FULL.md §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
	pub email: String,
	pub domain: String,
	pub timestamp: DateTime<Utc>,
	pub processing_ms: u64,

	pub format_valid: bool,
	pub has_mx: bool,
	pub is_disposable: bool,
	pub is_catch_all: bool,
	pub is_role_account: bool,
	pub is_spam_trap: bool,
	pub smtp_ok: bool,
	pub smtp_blocked_by_policy: bool,

	pub suggestion: Option<String>,
	pub errors: Vec<String>,
	pub details: VerificationDetails,

	pub reachable: Reachable,
	pub is_valid: bool,
	pub is_live: bool,

	pub from_cache: bool,
}

impl VerificationResult {
	pub fn derive_validity(&mut self, treat_policy_block_as_valid: bool) {
		let smtp_acceptable = self.smtp_ok || (treat_policy_block_as_valid && self.smtp_blocked_by_policy);

		self.is_valid = self.format_valid && self.has_mx && !self.is_disposable && smtp_acceptable && !self.is_spam_trap;

		self.is_live = self.is_valid && self.smtp_ok && !self.is_catch_all && !self.is_role_account;

		self.reachable = self.derive_reachable();
		self.details.reputation_score = self.derive_reputation_score();
	}

	/// A coarse 0-10 score: starts at 10 and loses a point for each risk
	/// signal raised, floored at 0 once the address is outright invalid.
	fn derive_reputation_score(&self) -> u8 {
		if !self.is_valid {
			return 0;
		}
		let mut score: i8 = 10;
		if self.is_catch_all {
			score -= 3;
		}
		if self.is_role_account {
			score -= 2;
		}
		if !self.details.has_spf {
			score -= 1;
		}
		if !self.details.has_dkim {
			score -= 1;
		}
		if !self.details.has_dmarc {
			score -= 1;
		}
		score.max(0) as u8
	}

	fn derive_reachable(&self) -> Reachable {
		if !self.format_valid || (self.has_mx && self.errors.iter().any(|e| e == "address rejected")) {
			return Reachable::Invalid;
		}
		if !self.has_mx {
			return if self.errors.iter().any(|e| e == "timeout") {
				Reachable::Unknown
			} else {
				Reachable::Invalid
			};
		}
		if self.is_disposable || self.is_role_account || self.is_catch_all || self.is_spam_trap {
			return Reachable::Risky;
		}
		if !self.smtp_ok && !self.smtp_blocked_by_policy {
			return Reachable::Unknown;
		}
		Reachable::Safe
	}
}
