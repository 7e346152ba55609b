pub mod data;

use serde::{Deserialize, Serialize};

use crate::util::levenshtein;

/// Domain categories used by the Enricher (§4.4, §4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DomainCategory {
	Legacy,
	Established,
	Institutional,
	Organization,
	Standard,
}

/// Pure, in-memory rules about a domain or address: disposable/free-provider
/// membership, typo suggestion, and category (§4.3).
#[derive(Debug, Default, Clone, Copy)]
pub struct DomainPolicy;

impl DomainPolicy {
	pub fn is_disposable(&self, domain: &str) -> bool {
		let domain = domain.to_lowercase();
		data::DISPOSABLE_DOMAINS.iter().any(|d| *d == domain)
	}

	pub fn is_free_provider(&self, domain: &str) -> bool {
		let domain = domain.to_lowercase();
		data::FREE_PROVIDERS.iter().any(|d| *d == domain)
	}

	/// Returns a corrected full address if `email`'s domain looks like a
	/// typo of a well-known domain, checking the hard-coded typo map first
	/// and falling back to edit-distance search (threshold <= 2).
	pub fn suggest(&self, email: &str) -> Option<String> {
		let at_pos = email.rfind('@')?;
		let local = &email[..at_pos];
		let domain = email[at_pos + 1..].to_lowercase();

		if let Some((_, corrected)) = data::TYPO_MAP.iter().find(|(typo, _)| *typo == domain) {
			return Some(format!("{local}@{corrected}"));
		}

		if data::WELL_KNOWN_DOMAINS.iter().any(|d| *d == domain) {
			return None;
		}

		let best = data::WELL_KNOWN_DOMAINS
			.iter()
			.map(|candidate| (*candidate, levenshtein::distance(&domain, candidate)))
			.min_by_key(|(_, dist)| *dist);

		match best {
			Some((candidate, dist)) if dist > 0 && dist <= 2 => Some(format!("{local}@{candidate}")),
			_ => None,
		}
	}

	pub fn category(&self, domain: &str) -> DomainCategory {
		let domain = domain.to_lowercase();

		if data::LEGACY_DOMAINS.iter().any(|d| *d == domain) {
			return DomainCategory::Legacy;
		}
		if data::ESTABLISHED_DOMAINS.iter().any(|d| *d == domain) {
			return DomainCategory::Established;
		}
		if domain.ends_with(".edu") || domain.ends_with(".gov") || domain.ends_with(".mil") {
			return DomainCategory::Institutional;
		}
		if domain.ends_with(".org") || domain.ends_with(".net") {
			return DomainCategory::Organization;
		}
		DomainCategory::Standard
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recognises_disposable_domain() {
		let policy = DomainPolicy;
		assert!(policy.is_disposable("mailinator.com"));
		assert!(policy.is_disposable("MAILINATOR.COM"));
		assert!(!policy.is_disposable("gmail.com"));
	}

	#[test]
	fn recognises_free_provider() {
		let policy = DomainPolicy;
		assert!(policy.is_free_provider("gmail.com"));
		assert!(!policy.is_free_provider("acme-inc.com"));
	}

	#[test]
	fn suggest_uses_typo_map_first() {
		let policy = DomainPolicy;
		assert_eq!(policy.suggest("a@gmal.com").as_deref(), Some("a@gmail.com"));
	}

	#[test]
	fn suggest_uses_edit_distance_fallback() {
		let policy = DomainPolicy;
		assert_eq!(policy.suggest("a@gmaii.com").as_deref(), Some("a@gmail.com"));
	}

	#[test]
	fn suggest_returns_none_for_well_known_domain() {
		let policy = DomainPolicy;
		assert_eq!(policy.suggest("a@gmail.com"), None);
	}

	#[test]
	fn suggest_returns_none_when_too_far() {
		let policy = DomainPolicy;
		assert_eq!(policy.suggest("a@acme-inc.com"), None);
	}

	#[test]
	fn category_classifies_edu_as_institutional() {
		let policy = DomainPolicy;
		assert_eq!(policy.category("mit.edu"), DomainCategory::Institutional);
	}

	#[test]
	fn category_classifies_org_as_organization() {
		let policy = DomainPolicy;
		assert_eq!(policy.category("example.org"), DomainCategory::Organization);
	}

	#[test]
	fn category_classifies_unknown_as_standard() {
		let policy = DomainPolicy;
		assert_eq!(policy.category("acme-inc.com"), DomainCategory::Standard);
	}
}
