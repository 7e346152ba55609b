use serde::{Deserialize, Serialize};

/// The result of the cheap, offline syntax check that runs before any
/// network access (see SPEC_FULL.md §4.6 step 2).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyntaxDetails {
	pub is_valid_syntax: bool,
	pub address: Option<String>,
	pub local_part: Option<String>,
	pub domain: Option<String>,
	/// Filled in lazily, only on the invalid/no-MX error paths, by
	/// `crate::policy::DomainPolicy::suggest`.
	pub suggestion: Option<String>,
}

/// Splits on the last `@` and applies the RFC-lite checks from §4.6 step 2:
/// local part no longer than 64 characters, no consecutive dots, domain
/// labels that don't start or end with a hyphen, and a top-level label of
/// at least two characters.
pub fn check_syntax(input: &str) -> SyntaxDetails {
	let input = input.trim();

	let at_pos = match input.rfind('@') {
		Some(pos) => pos,
		None => return SyntaxDetails::default(),
	};

	let local_part = &input[..at_pos];
	let raw_domain = &input[at_pos + 1..];

	// Internationalised domains are converted to their ASCII-compatible
	// encoding before any further check runs against them (SPEC_FULL.md §3);
	// a domain that fails IDNA conversion is treated as a syntax error.
	let domain = match idna::domain_to_ascii(raw_domain) {
		Ok(ascii) => ascii,
		Err(_) => return SyntaxDetails::default(),
	};

	if !is_valid_local_part(local_part) || !is_valid_domain(&domain) {
		return SyntaxDetails::default();
	}

	SyntaxDetails {
		is_valid_syntax: true,
		address: Some(format!("{local_part}@{domain}")),
		local_part: Some(local_part.to_string()),
		domain: Some(domain),
		suggestion: None,
	}
}

/// Splits on the last `@` without applying the RFC-lite checks, for callers
/// that pass `check_syntax=false` (SPEC_FULL.md §4.6): step 1's parse still
/// runs, but step 2's validity check is skipped, so a merely-odd-looking
/// address isn't rejected outright.
pub fn parse_loose(input: &str) -> SyntaxDetails {
	let input = input.trim();

	let at_pos = match input.rfind('@') {
		Some(pos) => pos,
		None => return SyntaxDetails::default(),
	};

	let local_part = &input[..at_pos];
	let raw_domain = &input[at_pos + 1..];
	if local_part.is_empty() || raw_domain.is_empty() {
		return SyntaxDetails::default();
	}

	let domain = idna::domain_to_ascii(raw_domain).unwrap_or_else(|_| raw_domain.to_lowercase());

	SyntaxDetails {
		is_valid_syntax: true,
		address: Some(format!("{local_part}@{domain}")),
		local_part: Some(local_part.to_string()),
		domain: Some(domain),
		suggestion: None,
	}
}

fn is_valid_local_part(local: &str) -> bool {
	if local.is_empty() || local.len() > 64 {
		return false;
	}
	if local.contains("..") {
		return false;
	}
	local
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`.{|}~".contains(c))
}

fn is_valid_domain(domain: &str) -> bool {
	if domain.is_empty() || domain.len() > 253 {
		return false;
	}
	let labels: Vec<&str> = domain.split('.').collect();
	if labels.len() < 2 {
		return false;
	}
	let Some(tld) = labels.last() else {
		return false;
	};
	if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
		return false;
	}
	labels.iter().all(|label| {
		!label.is_empty()
			&& !label.starts_with('-')
			&& !label.ends_with('-')
			&& label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
	})
}
