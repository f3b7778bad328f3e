//! Data cleaning for the merged board view.
//!
//! Pure and idempotent: placeholder removal, duplicate-unit fixes, gender
//! standardization, biomarker filtering, validation attachment, safety
//! sanitization of recommendations and trials, and the evidence-based
//! confidence recomputation that overrides anything the model reported.

use std::sync::OnceLock;

use regex::Regex;

use super::confidence::calculate_evidence_based_confidence;
use super::types::{BoardFinding, BoardRecommendation, ClinicalTrial, SeverityLevel, TumorBoardView};
use super::validation::{
    detect_disease_category, filter_biomarkers_by_disease, sanitize_recommendations,
    validate_for_treatment_recommendations, StagingFields, ValidationResult,
};

/// Classification of a raw field value.
///
/// Model output uses literal placeholder strings where data is missing;
/// cleaning is the pure transform `Placeholder -> Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Present(String),
    Absent,
    Placeholder,
}

pub fn classify_value(value: &str) -> FieldValue {
    if value.trim().is_empty() {
        return FieldValue::Absent;
    }
    if is_placeholder(value) {
        return FieldValue::Placeholder;
    }
    FieldValue::Present(value.to_string())
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"(?i)^(string$|string \(|Unknown$|None$|null$|N/A$|\s*$|2-3 sentence)")
            .expect("placeholder regex is valid")
    })
}

pub fn is_placeholder(value: &str) -> bool {
    placeholder_regex().is_match(value.trim())
}

/// Unit tokens that models duplicate when value and unit columns are both
/// transcribed with the unit attached.
const DUPLICATE_UNIT_TOKENS: &[&str] = &["%", "pg", "fL", "lakh/cu.mm", "million/cu.mm"];

fn is_unit_token(token: &str) -> bool {
    token.contains('/') || DUPLICATE_UNIT_TOKENS.contains(&token)
}

/// Trim a value, collapse duplicate adjacent unit tokens (`g/dL g/dL` →
/// `g/dL`), strip trailing `(None)` / ` None`.
pub fn clean_value(value: &str) -> String {
    let mut collapsed: Vec<&str> = Vec::new();
    for token in value.split_whitespace() {
        if let Some(&last) = collapsed.last() {
            if last == token && is_unit_token(token) {
                continue;
            }
        }
        collapsed.push(token);
    }
    let cleaned = collapsed.join(" ");

    static TRAILING_NONE: OnceLock<Regex> = OnceLock::new();
    let trailing = TRAILING_NONE
        .get_or_init(|| Regex::new(r"(\s*\(None\)\s*$|\s+None$)").expect("trailing regex is valid"));
    trailing.replace_all(&cleaned, "").trim().to_string()
}

pub fn standardize_gender(gender: &str) -> String {
    match gender.trim().to_lowercase().as_str() {
        "m" | "male" | "man" => "Male".to_string(),
        "f" | "female" | "woman" => "Female".to_string(),
        "" => String::new(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
    }
}

/// Clean one finding. `None` drops it.
pub fn clean_finding(finding: BoardFinding) -> Option<BoardFinding> {
    if is_placeholder(&finding.title) {
        return None;
    }
    let cleaned_value = clean_value(&finding.value);
    let value_gone = cleaned_value.is_empty() || is_placeholder(&cleaned_value);

    // Valueless rows survive only as informational or lab entries.
    if value_gone
        && !matches!(finding.severity, SeverityLevel::Info | SeverityLevel::Low)
        && finding.category != "lab"
    {
        return None;
    }

    Some(BoardFinding {
        title: clean_value(&finding.title),
        value: if value_gone { String::new() } else { cleaned_value },
        interpretation: finding
            .interpretation
            .map(|i| clean_value(&i))
            .filter(|i| !i.is_empty() && !is_placeholder(i)),
        ..finding
    })
}

pub fn clean_recommendation(rec: BoardRecommendation) -> Option<BoardRecommendation> {
    if is_placeholder(&rec.text) {
        return None;
    }
    let text = clean_value(&rec.text);
    if text.is_empty() {
        return None;
    }
    Some(BoardRecommendation {
        text,
        rationale: rec
            .rationale
            .map(|r| clean_value(&r))
            .filter(|r| !r.is_empty() && !is_placeholder(r)),
        ..rec
    })
}

/// Clean a trial and drop it on a disease-category mismatch.
pub fn clean_clinical_trial(trial: ClinicalTrial, disease_category: &str) -> Option<ClinicalTrial> {
    if is_placeholder(&trial.name) {
        return None;
    }
    let name = clean_value(&trial.name);
    if name.is_empty() {
        return None;
    }

    let name_lower = name.to_lowercase();
    if disease_category == "hematologic"
        && ["breast", "lung", "colon"].iter().any(|t| name_lower.contains(t))
    {
        return None;
    }
    if disease_category == "breast"
        && ["leukemia", "lymphoma", "myeloma"].iter().any(|t| name_lower.contains(t))
    {
        return None;
    }

    Some(ClinicalTrial {
        name,
        source: trial.source.map(|s| clean_value(&s)).filter(|s| !s.is_empty()),
        eligibility: trial
            .eligibility
            .map(|e| clean_value(&e))
            .filter(|e| !e.is_empty()),
    })
}

/// Clean the whole multi-agent view. Main entry point; idempotent.
pub fn clean_view(mut view: TumorBoardView) -> TumorBoardView {
    if let Some(gender) = view.patient_gender.take() {
        let standardized = standardize_gender(&gender);
        view.patient_gender = (!standardized.is_empty()).then_some(standardized);
    }

    view.findings.imaging = drain_clean(&mut view.findings.imaging);
    view.findings.pathology = drain_clean(&mut view.findings.pathology);
    view.findings.clinical = drain_clean(&mut view.findings.clinical);
    view.findings.biomarkers = drain_clean(&mut view.findings.biomarkers);

    // Disease category from the cleaned diagnosis text
    let diagnosis_text = view
        .findings
        .pathology
        .iter()
        .find(|f| f.category == "diagnosis")
        .map(|f| f.value.clone());
    let disease_category = detect_disease_category(&view.findings, diagnosis_text.as_deref());
    view.detected_disease_category = Some(disease_category.clone());

    view.findings.biomarkers = filter_biomarkers_by_disease(
        std::mem::take(&mut view.findings.biomarkers),
        &disease_category,
    );

    let staging = StagingFields {
        tnm: view.tnm_staging.as_deref(),
        clinical: view.clinical_stage.as_deref(),
        pathological: view.pathological_stage.as_deref(),
    };
    let validation = validate_for_treatment_recommendations(&view.findings, staging);

    view.diagnostic_status = Some(validation.status.as_str().to_string());
    view.data_completeness_score = Some(validation.data_completeness_score);
    view.missing_critical_data = validation.missing_critical_data.clone();
    if let Some(complexity) = &validation.complexity_override {
        view.case_complexity = Some(complexity.clone());
    }
    merge_warnings(&mut view.warnings, &validation.warnings);

    view.recommendations.treatment = sanitize_recommendations(
        view.recommendations
            .treatment
            .drain(..)
            .filter_map(clean_recommendation)
            .collect(),
        &validation,
    );
    view.recommendations.imaging = view
        .recommendations
        .imaging
        .drain(..)
        .filter_map(clean_recommendation)
        .collect();
    view.recommendations.other = view
        .recommendations
        .other
        .drain(..)
        .filter_map(clean_recommendation)
        .collect();

    let had_trials = !view.clinical_trials.is_empty();
    view.clinical_trials = view
        .clinical_trials
        .drain(..)
        .filter_map(|trial| clean_clinical_trial(trial, &disease_category))
        .collect();
    if !validation.is_safe_for_treatment_recs && !view.clinical_trials.is_empty() {
        view.clinical_trials.clear();
    }
    if !validation.is_safe_for_treatment_recs && had_trials {
        merge_warnings(
            &mut view.warnings,
            &["Clinical trials removed - diagnosis confirmation required for eligibility."
                .to_string()],
        );
    }

    // Evidence-based confidence overrides whatever the model reported
    let assessment = calculate_evidence_based_confidence(&view.findings, staging);
    view.overall_confidence = assessment.level.as_str().to_string();
    view.confidence_score = Some(assessment.score);
    view.confidence_justification = Some(assessment.justification);

    if is_placeholder(&view.executive_summary) {
        view.executive_summary = fallback_summary(&view, &validation);
    }

    view
}

fn drain_clean(findings: &mut Vec<BoardFinding>) -> Vec<BoardFinding> {
    findings.drain(..).filter_map(clean_finding).collect()
}

/// Order-preserving warning union.
fn merge_warnings(into: &mut Vec<String>, additions: &[String]) {
    for warning in additions {
        if !into.contains(warning) {
            into.push(warning.clone());
        }
    }
}

/// Safety-focused summary synthesized when the coordinator's summary is a
/// placeholder.
fn fallback_summary(view: &TumorBoardView, validation: &ValidationResult) -> String {
    let mut parts = Vec::new();

    let mut demographics = Vec::new();
    if let Some(age) = &view.patient_age {
        demographics.push(format!("{age} year old"));
    }
    if let Some(gender) = &view.patient_gender {
        demographics.push(gender.to_lowercase());
    }
    if demographics.is_empty() {
        parts.push(format!("Patient: {}.", view.patient_name));
    } else {
        parts.push(format!("{}, {}.", view.patient_name, demographics.join(" ")));
    }

    if !validation.is_safe_for_treatment_recs {
        parts.push("Diagnosis is PENDING pathology confirmation.".to_string());
    }

    let total = view.findings.total();
    if total > 0 {
        parts.push(format!("Analysis identified {total} clinical findings."));
    }

    if !validation.missing_critical_data.is_empty() {
        let top: Vec<&str> = validation
            .missing_critical_data
            .iter()
            .take(2)
            .map(String::as_str)
            .collect();
        parts.push(format!("Missing: {}.", top.join(", ")));
    }

    if !validation.is_safe_for_treatment_recs {
        parts.push("Treatment recommendations are preliminary only.".to_string());
    }

    if parts.is_empty() {
        "Case analysis completed. Diagnostic workup recommended.".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::FindingsByCategory;

    fn finding(category: &str, title: &str, value: &str) -> BoardFinding {
        BoardFinding {
            category: category.into(),
            title: title.into(),
            value: value.into(),
            severity: SeverityLevel::Moderate,
            source_agent: "test".into(),
            source_report: None,
            interpretation: None,
        }
    }

    fn rec(category: &str, text: &str) -> BoardRecommendation {
        BoardRecommendation {
            category: category.into(),
            text: text.into(),
            priority: SeverityLevel::Moderate,
            rationale: None,
            evidence_level: None,
        }
    }

    // ── Value cleaning ──────────────────────────────

    #[test]
    fn placeholder_detection() {
        for placeholder in ["string", "Unknown", "None", "null", "N/A", "", "   ", "2-3 sentence summary", "string (describe here)"] {
            assert!(is_placeholder(placeholder), "{placeholder:?} should be a placeholder");
        }
        for real in ["13.2 g/dL", "Invasive carcinoma", "unknown primary site"] {
            assert!(!is_placeholder(real), "{real:?} should not be a placeholder");
        }
    }

    #[test]
    fn classify_value_maps_placeholders() {
        assert_eq!(classify_value("13.2"), FieldValue::Present("13.2".into()));
        assert_eq!(classify_value("null"), FieldValue::Placeholder);
        assert_eq!(classify_value("  "), FieldValue::Absent);
    }

    #[test]
    fn duplicate_units_are_collapsed() {
        assert_eq!(clean_value("13.2 g/dL g/dL"), "13.2 g/dL");
        assert_eq!(clean_value("42 % %"), "42 %");
        assert_eq!(clean_value("2.1 lakh/cu.mm lakh/cu.mm"), "2.1 lakh/cu.mm");
        assert_eq!(clean_value("30 pg pg"), "30 pg");
        assert_eq!(clean_value("88 fL fL"), "88 fL");
        // Distinct units untouched
        assert_eq!(clean_value("13.2 g/dL mg/dL"), "13.2 g/dL mg/dL");
    }

    #[test]
    fn trailing_none_is_stripped() {
        assert_eq!(clean_value("Positive (None)"), "Positive");
        assert_eq!(clean_value("Positive None"), "Positive");
        assert_eq!(clean_value("None of the above"), "None of the above");
    }

    #[test]
    fn gender_standardization() {
        assert_eq!(standardize_gender("m"), "Male");
        assert_eq!(standardize_gender("MALE"), "Male");
        assert_eq!(standardize_gender("woman"), "Female");
        assert_eq!(standardize_gender("F"), "Female");
        assert_eq!(standardize_gender("nonbinary"), "Nonbinary");
        // Idempotent on already-standardized values
        assert_eq!(standardize_gender("Male"), "Male");
    }

    // ── Finding / recommendation cleaning ──────────

    #[test]
    fn placeholder_findings_are_dropped() {
        assert!(clean_finding(finding("biomarker", "string", "Positive")).is_none());
        assert!(clean_finding(finding("biomarker", "Unknown", "null")).is_none());
        assert!(clean_finding(finding("tumor", "Mass", "N/A")).is_none());
    }

    #[test]
    fn lab_findings_survive_empty_values() {
        let mut lab = finding("lab", "Hemoglobin", "null");
        lab.severity = SeverityLevel::High;
        let cleaned = clean_finding(lab).unwrap();
        assert_eq!(cleaned.value, "");
    }

    #[test]
    fn placeholder_recommendations_are_dropped() {
        assert!(clean_recommendation(rec("treatment", "string")).is_none());
        assert!(clean_recommendation(rec("treatment", "  ")).is_none());
        let kept = clean_recommendation(rec("treatment", "Start chemotherapy (None)")).unwrap();
        assert_eq!(kept.text, "Start chemotherapy");
    }

    #[test]
    fn trial_disease_mismatch_is_dropped() {
        let trial = |name: &str| ClinicalTrial {
            name: name.into(),
            source: None,
            eligibility: None,
        };
        assert!(clean_clinical_trial(trial("Breast cancer vaccine study"), "hematologic").is_none());
        assert!(clean_clinical_trial(trial("CAR-T for lymphoma"), "breast").is_none());
        assert!(clean_clinical_trial(trial("CAR-T for lymphoma"), "hematologic").is_some());
        assert!(clean_clinical_trial(trial("string"), "unknown").is_none());
    }

    // ── Full view cleaning ──────────────────────────

    fn unsafe_view() -> TumorBoardView {
        let mut view = TumorBoardView::new("p-1", "Jane Doe");
        view.patient_age = Some("54".into());
        view.patient_gender = Some("f".into());
        view.executive_summary = "2-3 sentence summary".into();
        view.overall_confidence = "high".into();
        view.findings = FindingsByCategory {
            imaging: vec![],
            pathology: vec![],
            clinical: vec![
                finding("lab", "Hemoglobin", "13.2 g/dL g/dL"),
                finding("lab", "WBC", "7200"),
                finding("lab", "Platelet", "210000"),
            ],
            biomarkers: vec![finding("biomarker", "string", "string")],
        };
        view.recommendations.treatment = vec![
            rec("treatment", "Start FOLFOX chemotherapy"),
            rec("treatment", "Evaluate with biopsy to confirm diagnosis"),
        ];
        view.clinical_trials = vec![ClinicalTrial {
            name: "Some trial".into(),
            source: None,
            eligibility: None,
        }];
        view
    }

    #[test]
    fn unsafe_case_is_fully_gated() {
        let cleaned = clean_view(unsafe_view());

        assert_eq!(cleaned.patient_gender.as_deref(), Some("Female"));
        assert_eq!(cleaned.diagnostic_status.as_deref(), Some("diagnostic_workup_required"));
        assert!(cleaned.clinical_trials.is_empty(), "trials removed when unsafe");
        // Only the diagnostic-intent recommendation survives, re-categorized
        assert_eq!(cleaned.recommendations.treatment.len(), 1);
        assert_eq!(cleaned.recommendations.treatment[0].category, "diagnostic");
        // Evidence-based confidence overrides the model's "high"
        assert!(matches!(
            cleaned.overall_confidence.as_str(),
            "very_low" | "low"
        ));
        assert!(cleaned.warnings.iter().any(|w| w.contains("Diagnosis pending")));
        assert!(cleaned
            .warnings
            .iter()
            .any(|w| w.contains("No imaging data available")));
        // Placeholder biomarker was dropped before filtering
        assert!(cleaned.findings.biomarkers.is_empty());
        // Duplicate unit fixed
        assert_eq!(cleaned.findings.clinical[0].value, "13.2 g/dL");
    }

    #[test]
    fn placeholder_summary_is_replaced_with_fallback() {
        let cleaned = clean_view(unsafe_view());
        assert!(cleaned.executive_summary.contains("Jane Doe"));
        assert!(cleaned.executive_summary.contains("54 year old"));
        assert!(cleaned
            .executive_summary
            .contains("Diagnosis is PENDING pathology confirmation."));
        assert!(cleaned
            .executive_summary
            .contains("Treatment recommendations are preliminary only."));
    }

    #[test]
    fn real_summary_is_preserved() {
        let mut view = unsafe_view();
        view.executive_summary = "Confirmed carcinoma, staging underway.".into();
        let cleaned = clean_view(view);
        assert_eq!(cleaned.executive_summary, "Confirmed carcinoma, staging underway.");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_view(unsafe_view());
        let twice = clean_view(once.clone());

        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn safe_case_keeps_treatments_and_trials() {
        let mut view = unsafe_view();
        view.findings.imaging = vec![finding("tumor", "Breast mass", "2.1 cm")];
        view.findings.pathology = vec![finding(
            "diagnosis",
            "Histological Diagnosis",
            "Invasive ductal carcinoma",
        )];
        view.tnm_staging = Some("T2N0M0".into());
        view.clinical_trials = vec![ClinicalTrial {
            name: "Adjuvant therapy study".into(),
            source: Some("NCT00000001".into()),
            eligibility: None,
        }];

        let cleaned = clean_view(view);
        assert_eq!(cleaned.detected_disease_category.as_deref(), Some("breast"));
        assert_eq!(cleaned.recommendations.treatment.len(), 2);
        assert_eq!(cleaned.clinical_trials.len(), 1);
        assert_eq!(cleaned.diagnostic_status.as_deref(), Some("ready_for_review"));
    }

    #[test]
    fn critical_labs_set_case_complexity() {
        let mut view = unsafe_view();
        view.findings.clinical.push(finding("lab", "Hemoglobin level", "6.1"));
        let cleaned = clean_view(view);
        assert_eq!(cleaned.case_complexity.as_deref(), Some("high"));
        assert!(cleaned.warnings.iter().any(|w| w.contains("Severe anemia")));
    }
}
