//! Value types for per-page and per-document extraction results.
//!
//! These model the full lifecycle: OCR text → structural extraction →
//! verification → validation → cross-page merge. All are plain serde
//! values; the job store serializes them as JSON.

use serde::{Deserialize, Serialize};

/// A single tabular medical finding, values preserved verbatim from the
/// source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub test_name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
}

impl Finding {
    pub fn new(test_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            value: value.into(),
            unit: None,
            reference_range: None,
            status: None,
            interpretation: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Patient identity fields as printed on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
}

impl PatientIdentity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.id.is_none()
            && self.dob.is_none()
            && self.gender.is_none()
            && self.age.is_none()
    }
}

/// Report header metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub lab_name: Option<String>,
    #[serde(default)]
    pub referring_physician: Option<String>,
}

/// Extraction result for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAnalysis {
    #[serde(default)]
    pub page_number: usize,
    #[serde(default)]
    pub patient_identity: PatientIdentity,
    #[serde(default)]
    pub report_metadata: ReportMetadata,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub extraction_confidence: f32,
    #[serde(default)]
    pub raw_text_preview: String,
}

impl PageAnalysis {
    /// Empty analysis carrying a single warning, for degraded pages.
    pub fn empty(page_number: usize, warning: impl Into<String>) -> Self {
        Self {
            page_number,
            patient_identity: PatientIdentity::default(),
            report_metadata: ReportMetadata::default(),
            findings: Vec::new(),
            diagnosis: None,
            recommendations: Vec::new(),
            warnings: vec![warning.into()],
            extraction_confidence: 0.0,
            raw_text_preview: String::new(),
        }
    }
}

/// Document-level analysis after the cross-page merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub patient_identity: PatientIdentity,
    pub report_metadata: ReportMetadata,
    pub all_findings: Vec<Finding>,
    pub diagnoses: Vec<String>,
    pub recommendations: Vec<String>,
    pub aggregate_confidence: f32,
    pub merge_warnings: Vec<String>,
}

/// First numeric substring of a value (`"13.2 g/dL"` → `"13.2"`).
/// Used by verbatim-value verification; `None` for purely textual values.
pub fn first_numeric_substring(value: &str) -> Option<&str> {
    let bytes = value.as_bytes();
    let start = bytes.iter().position(|b| b.is_ascii_digit())?;
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot && end + 1 < bytes.len() && bytes[end + 1].is_ascii_digit() => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    Some(&value[start..end])
}

/// Verify a patient name against page text: at least half of its tokens
/// longer than two characters must appear case-insensitively.
pub fn name_verified_in_text(name: &str, text: &str) -> bool {
    let lower_text = text.to_lowercase();
    let tokens: Vec<&str> = name
        .split_whitespace()
        .filter(|token| token.len() > 2)
        .collect();
    if tokens.is_empty() {
        // Nothing checkable; treat short names as unverifiable-but-kept.
        return true;
    }
    let matched = tokens
        .iter()
        .filter(|token| lower_text.contains(&token.to_lowercase()))
        .count();
    matched * 2 >= tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_numeric_substring_basic() {
        assert_eq!(first_numeric_substring("13.2 g/dL"), Some("13.2"));
        assert_eq!(first_numeric_substring("Hb: 7"), Some("7"));
        assert_eq!(first_numeric_substring("210,000"), Some("210"));
        assert_eq!(first_numeric_substring("positive"), None);
        assert_eq!(first_numeric_substring(""), None);
    }

    #[test]
    fn first_numeric_substring_does_not_trail_dot() {
        assert_eq!(first_numeric_substring("value 13. end"), Some("13"));
        assert_eq!(first_numeric_substring("1.2.3"), Some("1.2"));
    }

    #[test]
    fn name_verification_requires_half_tokens() {
        let text = "Patient: Jane Doe\nHemoglobin 13.2 g/dL";
        assert!(name_verified_in_text("Jane Doe", text));
        assert!(name_verified_in_text("JANE DOE", text));
        assert!(!name_verified_in_text("John Smith", text));
        // One of two long tokens present — exactly half passes
        assert!(name_verified_in_text("Jane Smithson", text));
    }

    #[test]
    fn short_token_names_are_not_cleared() {
        // All tokens length <= 2 leave nothing to check
        assert!(name_verified_in_text("J D", "unrelated text"));
    }

    #[test]
    fn empty_page_analysis_carries_warning() {
        let analysis = PageAnalysis::empty(3, "Failed to parse LLM response as JSON");
        assert_eq!(analysis.page_number, 3);
        assert!(analysis.findings.is_empty());
        assert_eq!(analysis.extraction_confidence, 0.0);
        assert_eq!(analysis.warnings, vec!["Failed to parse LLM response as JSON"]);
    }

    #[test]
    fn finding_serde_omits_absent_fields() {
        let finding = Finding::new("Hemoglobin", "13.2").with_unit("g/dL");
        let json = serde_json::to_string(&finding).unwrap();
        assert!(json.contains("\"unit\":\"g/dL\""));
        assert!(!json.contains("reference_range"));
        assert!(!json.contains("interpretation"));
    }

    #[test]
    fn page_analysis_deserializes_with_missing_fields() {
        let json = r#"{"page_number": 1, "findings": [{"test_name": "WBC", "value": "7200"}]}"#;
        let analysis: PageAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.findings.len(), 1);
        assert!(analysis.patient_identity.is_empty());
        assert_eq!(analysis.extraction_confidence, 0.0);
    }
}
