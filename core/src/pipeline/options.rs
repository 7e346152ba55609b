use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Tunables for a single [`super::verify`] call (SPEC_FULL.md §4.6).
///
/// Every flag defaults to the behaviour a caller almost always wants; pass
/// a customised instance only to skip specific checks (e.g. a bulk import
/// that already trusts MX validity and wants to skip SMTP entirely).
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq, Eq)]
#[builder(default)]
pub struct VerifyOptions {
	pub use_cache: bool,
	pub check_syntax: bool,
	pub check_mx: bool,
	pub check_disposable: bool,
	pub check_typos: bool,
	pub check_catch_all: bool,
	pub check_smtp: bool,
	pub check_spam_trap: bool,
	pub check_role_account: bool,
	pub cache_results: bool,
	pub alt_dns: bool,
	pub timeout_ms: u64,
}

impl Default for VerifyOptions {
	fn default() -> Self {
		VerifyOptions {
			use_cache: true,
			check_syntax: true,
			check_mx: true,
			check_disposable: true,
			check_typos: true,
			check_catch_all: true,
			check_smtp: true,
			check_spam_trap: true,
			check_role_account: true,
			cache_results: true,
			alt_dns: false,
			timeout_ms: 10_000,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_overrides_only_the_fields_set() {
		let opts = VerifyOptionsBuilder::default()
			.check_smtp(false)
			.build()
			.unwrap();
		assert!(!opts.check_smtp);
		assert!(opts.check_mx);
		assert_eq!(opts.timeout_ms, 10_000);
	}
}
