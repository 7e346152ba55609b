/// Embedded reference data for the Domain Policy component. These lists are
/// intentionally short and representative rather than exhaustive -- a real
/// deployment would load a maintained list at startup; this crate ships
/// enough to make the policy checks behave correctly out of the box and in
/// tests.

pub const DISPOSABLE_DOMAINS: &[&str] = &[
	"mailinator.com",
	"10minutemail.com",
	"guerrillamail.com",
	"tempmail.com",
	"temp-mail.org",
	"throwawaymail.com",
	"yopmail.com",
	"getnada.com",
	"trashmail.com",
	"fakeinbox.com",
	"sharklasers.com",
	"dispostable.com",
	"maildrop.cc",
	"mintemail.com",
	"mailnesia.com",
];

pub const FREE_PROVIDERS: &[&str] = &[
	"gmail.com",
	"yahoo.com",
	"outlook.com",
	"hotmail.com",
	"live.com",
	"aol.com",
	"icloud.com",
	"protonmail.com",
	"proton.me",
	"gmx.com",
	"mail.com",
	"zoho.com",
	"yandex.com",
];

pub const ROLE_ACCOUNT_LOCAL_PARTS: &[&str] = &[
	"admin",
	"administrator",
	"webmaster",
	"hostmaster",
	"postmaster",
	"abuse",
	"security",
	"support",
	"info",
	"contact",
	"sales",
	"marketing",
	"help",
	"noreply",
	"no-reply",
];

/// Country-compound second-level domains under which the *third* label is
/// the meaningful company name (e.g. `acme.co.uk` -> "Acme", not "Co").
pub const COUNTRY_COMPOUND_DOMAINS: &[&str] = &["co.uk", "com.au", "co.nz", "co.jp", "co.za", "com.br"];

/// Domains considered part of the long-lived, pre-2000 internet; used by
/// `DomainPolicy::category` to tag `legacy`.
pub const LEGACY_DOMAINS: &[&str] = &["aol.com", "compuserve.com", "juno.com", "netscape.net", "earthlink.net"];

/// Domains considered well-established mainstream providers; used by
/// `DomainPolicy::category` to tag `established`.
pub const ESTABLISHED_DOMAINS: &[&str] = &[
	"gmail.com",
	"yahoo.com",
	"outlook.com",
	"hotmail.com",
	"live.com",
	"icloud.com",
	"protonmail.com",
];

/// Canonical domains used as the correction target of `DomainPolicy::suggest`
/// when no hard-coded typo match applies.
pub const WELL_KNOWN_DOMAINS: &[&str] = &[
	"gmail.com",
	"yahoo.com",
	"outlook.com",
	"hotmail.com",
	"live.com",
	"aol.com",
	"icloud.com",
	"protonmail.com",
];

/// Hard-coded typo corrections, checked before falling back to edit-distance
/// search against [`WELL_KNOWN_DOMAINS`].
pub const TYPO_MAP: &[(&str, &str)] = &[
	("gmal.com", "gmail.com"),
	("gmial.com", "gmail.com"),
	("gmaill.com", "gmail.com"),
	("gamil.com", "gmail.com"),
	("gnail.com", "gmail.com"),
	("yaho.com", "yahoo.com"),
	("yahooo.com", "yahoo.com"),
	("hotmial.com", "hotmail.com"),
	("hotmil.com", "hotmail.com"),
	("outlok.com", "outlook.com"),
	("outloo.com", "outlook.com"),
];
