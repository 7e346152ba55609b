use serde::{Deserialize, Serialize};

use crate::pipeline::{VerificationResult, VerifierPipeline, VerifyOptions};
use crate::policy::{DomainCategory, DomainPolicy};
use crate::util::constants::{COUNTRY_COMPOUND_DOMAINS, ROLE_ACCOUNT_LOCAL_PARTS};

/// A guessed person name derived from a local part (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PossibleName {
	pub full: String,
	pub first: String,
	pub last: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enrichment {
	pub possible_name: Option<PossibleName>,
	pub possible_company: Option<String>,
	pub is_free_provider: bool,
	pub domain_category: DomainCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedResult {
	pub verification: VerificationResult,
	pub enrichment: Option<Enrichment>,
}

pub struct Enricher<'a> {
	pipeline: &'a VerifierPipeline,
	policy: DomainPolicy,
}

impl<'a> Enricher<'a> {
	pub fn new(pipeline: &'a VerifierPipeline) -> Self {
		Enricher {
			pipeline,
			policy: DomainPolicy,
		}
	}

	pub async fn enrich(&self, email: &str, options: &VerifyOptions) -> EnrichedResult {
		let verification = self.pipeline.verify(email, options).await;

		if !verification.is_valid {
			return EnrichedResult {
				verification,
				enrichment: None,
			};
		}

		let local_part = email.rsplit_once('@').map(|(l, _)| l).unwrap_or_default();
		let domain = verification.domain.clone();
		let is_free_provider = self.policy.is_free_provider(&domain);

		let enrichment = Enrichment {
			possible_name: guess_name(local_part),
			possible_company: if is_free_provider { None } else { guess_company(&domain) },
			is_free_provider,
			domain_category: self.policy.category(&domain),
		};

		EnrichedResult {
			verification,
			enrichment: Some(enrichment),
		}
	}
}

fn guess_name(local_part: &str) -> Option<PossibleName> {
	let normalised: String = local_part
		.chars()
		.map(|c| if c == '.' || c == '_' || c == '-' { ' ' } else { c })
		.collect();
	let trimmed: String = normalised.trim_end_matches(|c: char| c.is_ascii_digit()).to_string();

	let mut raw_words: Vec<&str> = trimmed.split_whitespace().filter(|w| !w.is_empty()).collect();

	// Strip a leading role prefix (the same set `is_role_account` matches
	// against) so e.g. "support.jane" enriches to "Jane" rather than being
	// discarded entirely.
	if let Some(first) = raw_words.first() {
		if ROLE_ACCOUNT_LOCAL_PARTS.iter().any(|r| *r == first.to_lowercase()) {
			raw_words.remove(0);
		}
	}

	let words: Vec<String> = raw_words.into_iter().map(capitalise).collect();

	if words.is_empty() {
		return None;
	}

	if words.len() == 1 {
		return Some(PossibleName {
			full: words[0].clone(),
			first: words[0].clone(),
			last: None,
		});
	}

	let first = words[0].clone();
	let last = words[1..].join(" ");
	Some(PossibleName {
		full: format!("{first} {last}"),
		first,
		last: Some(last),
	})
}

fn guess_company(domain: &str) -> Option<String> {
	let labels: Vec<&str> = domain.split('.').collect();
	if labels.len() < 2 {
		return None;
	}

	let last_two = labels[labels.len().saturating_sub(2)..].join(".");
	let company_label = if COUNTRY_COMPOUND_DOMAINS.iter().any(|c| *c == last_two) && labels.len() >= 3 {
		labels[labels.len() - 3]
	} else {
		labels[labels.len() - 2]
	};

	let spaced: String = company_label
		.chars()
		.map(|c| if c == '-' || c == '_' { ' ' } else { c })
		.collect();

	let title_cased = spaced.split_whitespace().map(capitalise).collect::<Vec<_>>().join(" ");
	if title_cased.is_empty() {
		None
	} else {
		Some(title_cased)
	}
}

fn capitalise(word: &str) -> String {
	let mut chars = word.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn guesses_two_word_name() {
		let name = guess_name("john.doe").unwrap();
		assert_eq!(name.first, "John");
		assert_eq!(name.last.as_deref(), Some("Doe"));
		assert_eq!(name.full, "John Doe");
	}

	#[test]
	fn guesses_single_word_name() {
		let name = guess_name("alice").unwrap();
		assert_eq!(name.first, "Alice");
		assert_eq!(name.last, None);
	}

	#[test]
	fn strips_trailing_digits() {
		let name = guess_name("john.doe42").unwrap();
		assert_eq!(name.full, "John Doe");
	}

	#[test]
	fn role_accounts_have_no_guessed_name() {
		assert_eq!(guess_name("admin"), None);
	}

	#[test]
	fn strips_leading_role_prefix() {
		let name = guess_name("support.jane").unwrap();
		assert_eq!(name.first, "Jane");
		assert_eq!(name.last, None);
	}

	#[test]
	fn guesses_company_from_second_level_domain() {
		assert_eq!(guess_company("example.com").as_deref(), Some("Example"));
	}

	#[test]
	fn guesses_company_with_hyphen() {
		assert_eq!(guess_company("acme-inc.com").as_deref(), Some("Acme Inc"));
	}

	#[test]
	fn guesses_company_handles_country_compound_tld() {
		assert_eq!(guess_company("acme.co.uk").as_deref(), Some("Acme"));
	}
}
