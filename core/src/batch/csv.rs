use crate::pipeline::VerificationResult;

/// Renders results in the fixed column order from SPEC_FULL.md §6:
/// `Email, Valid, Format Valid, MX Records, Disposable, SMTP Check, Role
/// Account, Catch All, Spam Trap, Suggestion`.
///
/// The writer runs with `QuoteStyle::Never` and fields are escaped by hand
/// so the Suggestion column can always be double-quoted when present (per
/// §6's wire format) while the other columns stay bare.
pub fn export(results: &[VerificationResult]) -> Result<String, csv::Error> {
	let mut writer = csv::WriterBuilder::new()
		.quote_style(csv::QuoteStyle::Never)
		.from_writer(vec![]);

	writer.write_record([
		"Email",
		"Valid",
		"Format Valid",
		"MX Records",
		"Disposable",
		"SMTP Check",
		"Role Account",
		"Catch All",
		"Spam Trap",
		"Suggestion",
	])?;

	for r in results {
		let mx_records = r
			.details
			.mx_records
			.iter()
			.map(|mx| mx.exchange.clone())
			.collect::<Vec<_>>()
			.join(";");

		writer.write_record([
			escape_field(r.email.as_str()),
			bool_str(r.is_valid).to_string(),
			bool_str(r.format_valid).to_string(),
			escape_field(mx_records.as_str()),
			bool_str(r.is_disposable).to_string(),
			bool_str(r.smtp_ok).to_string(),
			bool_str(r.is_role_account).to_string(),
			bool_str(r.is_catch_all).to_string(),
			bool_str(r.is_spam_trap).to_string(),
			quote_suggestion(r.suggestion.as_deref()),
		])?;
	}

	let bytes = writer.into_inner().map_err(|e| e.into_error())?;
	Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn bool_str(b: bool) -> &'static str {
	if b {
		"true"
	} else {
		"false"
	}
}

fn escape_field(s: &str) -> String {
	if s.contains(',') || s.contains('"') || s.contains('\n') {
		format!("\"{}\"", s.replace('"', "\"\""))
	} else {
		s.to_string()
	}
}

/// Always double-quoted when present, empty when absent, per §6.
fn quote_suggestion(suggestion: Option<&str>) -> String {
	match suggestion {
		Some(s) => format!("\"{}\"", s.replace('"', "\"\"")),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pipeline::{Reachable, VerificationDetails};
	use chrono::Utc;

	fn sample_result(email: &str) -> VerificationResult {
		VerificationResult {
			email: email.to_string(),
			domain: "example.com".to_string(),
			timestamp: Utc::now(),
			processing_ms: 10,
			format_valid: true,
			has_mx: true,
			is_disposable: false,
			is_catch_all: false,
			is_role_account: false,
			is_spam_trap: false,
			smtp_ok: true,
			smtp_blocked_by_policy: false,
			suggestion: None,
			errors: vec![],
			details: VerificationDetails::default(),
			reachable: Reachable::Safe,
			is_valid: true,
			is_live: true,
			from_cache: false,
		}
	}

	#[test]
	fn header_row_matches_specified_column_order() {
		let csv_text = export(&[]).unwrap();
		let header = csv_text.lines().next().unwrap();
		assert_eq!(
			header,
			"Email,Valid,Format Valid,MX Records,Disposable,SMTP Check,Role Account,Catch All,Spam Trap,Suggestion"
		);
	}

	#[test]
	fn row_count_matches_input_count() {
		let results = vec![sample_result("a@example.com"), sample_result("b@example.com")];
		let csv_text = export(&results).unwrap();
		assert_eq!(csv_text.lines().count(), 3);
	}

	#[test]
	fn booleans_are_rendered_literally() {
		let csv_text = export(&[sample_result("a@example.com")]).unwrap();
		let row = csv_text.lines().nth(1).unwrap();
		assert!(row.contains("true"));
	}

	#[test]
	fn suggestion_is_double_quoted_when_present() {
		let mut result = sample_result("a@gnail.com");
		result.suggestion = Some("a@gmail.com".to_string());
		let csv_text = export(&[result]).unwrap();
		let row = csv_text.lines().nth(1).unwrap();
		assert!(row.ends_with("\"a@gmail.com\""));
	}

	#[test]
	fn suggestion_is_empty_when_absent() {
		let csv_text = export(&[sample_result("a@example.com")]).unwrap();
		let row = csv_text.lines().nth(1).unwrap();
		assert!(row.ends_with(','));
	}
}
