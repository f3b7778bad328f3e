//! Deterministic verification: decides whether the validation LLM pass is
//! needed for a page.
//!
//! A finding is verified when its test name and value can both be matched
//! against the page's OCR text. Clean reports verify almost everything,
//! which skips the second LLM pass for the majority of pages.

use super::types::{first_numeric_substring, Finding};

/// Decide whether the validation pass is required.
///
/// A finding is verified iff at least one whitespace token of its test name
/// longer than two characters appears case-insensitively in the OCR text,
/// AND its value (or the value's first numeric substring) appears verbatim.
///
/// The pass is required iff the number of unverified findings reaches
/// `max(1, ceil(threshold * total))`. No findings → not required.
pub fn needs_validation(
    findings: &[Finding],
    ocr_text: &str,
    threshold: f32,
) -> (bool, Vec<String>) {
    if findings.is_empty() {
        return (false, Vec::new());
    }

    let lower_text = ocr_text.to_lowercase();
    let mut warnings = Vec::new();
    let mut unverified = 0usize;

    for finding in findings {
        if !finding_verified(finding, ocr_text, &lower_text) {
            unverified += 1;
            warnings.push(format!(
                "Finding '{}' (value '{}') could not be verified against OCR text",
                finding.test_name, finding.value
            ));
        }
    }

    let required_at = ((threshold * findings.len() as f32).ceil() as usize).max(1);
    (unverified >= required_at, warnings)
}

fn finding_verified(finding: &Finding, ocr_text: &str, lower_text: &str) -> bool {
    let name_matched = finding
        .test_name
        .split_whitespace()
        .filter(|token| token.len() > 2)
        .any(|token| lower_text.contains(&token.to_lowercase()));
    if !name_matched {
        return false;
    }

    if ocr_text.contains(finding.value.trim()) {
        return true;
    }
    match first_numeric_substring(&finding.value) {
        Some(numeric) => ocr_text.contains(numeric),
        None => false,
    }
}
