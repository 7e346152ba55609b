pub use crate::util::constants::{
	COUNTRY_COMPOUND_DOMAINS, DISPOSABLE_DOMAINS, ESTABLISHED_DOMAINS, FREE_PROVIDERS, LEGACY_DOMAINS, TYPO_MAP,
	WELL_KNOWN_DOMAINS,
};
