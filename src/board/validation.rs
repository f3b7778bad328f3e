//! Clinical validation: evidence-based safety gating for the board view.
//!
//! Pure computation over categorized findings. Blocks treatment
//! recommendations until sufficient diagnostic evidence exists, scores
//! data completeness, escalates case complexity on critical lab values,
//! and filters biomarkers down to the detected disease's relevant set.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::{BoardFinding, BoardRecommendation, FindingsByCategory};

/// Case readiness derived from the completeness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStatus {
    DiagnosticWorkupRequired,
    PendingConfirmation,
    Preliminary,
    ReadyForReview,
}

impl DiagnosticStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiagnosticWorkupRequired => "diagnostic_workup_required",
            Self::PendingConfirmation => "pending_confirmation",
            Self::Preliminary => "preliminary",
            Self::ReadyForReview => "ready_for_review",
        }
    }
}

/// Result of the clinical validation checks.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_safe_for_treatment_recs: bool,
    pub data_completeness_score: f32,
    pub status: DiagnosticStatus,
    pub missing_critical_data: Vec<String>,
    pub warnings: Vec<String>,
    pub complexity_override: Option<String>,
}

/// Explicit staging fields carried beside the categorized findings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagingFields<'a> {
    pub tnm: Option<&'a str>,
    pub clinical: Option<&'a str>,
    pub pathological: Option<&'a str>,
}

/// Disease category to relevant biomarker mapping.
const DISEASE_BIOMARKERS: &[(&str, &[&str])] = &[
    ("breast", &["ER", "PR", "HER2", "KI-67", "BRCA1", "BRCA2"]),
    ("lung", &["EGFR", "ALK", "PD-L1", "ROS1", "KRAS", "MET", "BRAF"]),
    ("colorectal", &["KRAS", "NRAS", "BRAF", "MSI", "MMR"]),
    (
        "hematologic",
        &["BCR-ABL", "FLT3", "NPM1", "IDH1", "IDH2", "CD", "JAK2", "MPL", "CALR"],
    ),
    ("prostate", &["PSA", "AR", "PTEN", "BRCA"]),
    ("ovarian", &["BRCA1", "BRCA2", "HRD", "CA-125"]),
    ("melanoma", &["BRAF", "NRAS", "KIT", "PD-L1"]),
];

/// Markers relevant regardless of disease.
const GENERIC_BIOMARKERS: &[&str] = &["LDH", "AFP", "CEA", "CA-125", "CA-19"];

const PLACEHOLDER_VALUES: &[&str] = &["string", "unknown", "n/a", "null", "none", ""];

const SPECIFIC_DIAGNOSIS_ROOTS: &[&str] = &[
    "carcinoma", "lymphoma", "leukemia", "sarcoma", "melanoma", "adenoma", "myeloma",
];

fn leading_number(value: &str) -> Option<f32> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"[\d.]+").expect("number regex is valid"));
    re.find(value)?.as_str().parse().ok()
}

fn is_real_value(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    !PLACEHOLDER_VALUES.contains(&lower.as_str())
}

/// A definitive diagnosis exists iff a pathology finding of category
/// `diagnosis` carries one of the specific disease roots.
pub fn is_diagnosis_confirmed(findings: &FindingsByCategory) -> bool {
    findings
        .pathology
        .iter()
        .filter(|f| f.category == "diagnosis")
        .any(|f| {
            let value = f.value.trim().to_lowercase();
            is_real_value(&value) && SPECIFIC_DIAGNOSIS_ROOTS.iter().any(|root| value.contains(root))
        })
}

pub fn has_imaging_data(findings: &FindingsByCategory) -> bool {
    !findings.imaging.is_empty()
}

/// At least one pathology finding with a non-placeholder value.
pub fn has_pathology_confirmation(findings: &FindingsByCategory) -> bool {
    findings.pathology.iter().any(|f| is_real_value(&f.value))
}

pub fn is_staging_available(findings: &FindingsByCategory, staging: StagingFields<'_>) -> bool {
    let explicit = [staging.tnm, staging.clinical, staging.pathological]
        .into_iter()
        .flatten()
        .any(|s| !s.trim().is_empty());
    if explicit {
        return true;
    }

    let staging_terms = [
        "stage", "tnm", "t1", "t2", "t3", "t4", "n0", "n1", "m0", "m1",
    ];
    findings
        .pathology
        .iter()
        .chain(findings.clinical.iter())
        .any(|f| {
            let title = f.title.to_lowercase();
            staging_terms.iter().any(|term| title.contains(term))
                && is_real_value(&f.value)
                && !f.value.to_lowercase().contains("pending")
        })
}

/// Infer disease category: keyword match on the diagnosis text first, then
/// a hematologic heuristic over clinical finding titles.
pub fn detect_disease_category(findings: &FindingsByCategory, diagnosis: Option<&str>) -> String {
    let diagnosis_lower = diagnosis.unwrap_or("").to_lowercase();

    let keyword_map: [(&[&str], &str); 7] = [
        (&["breast", "mammary"], "breast"),
        (&["lung", "pulmonary", "bronchial"], "lung"),
        (&["colon", "rectal", "colorectal", "bowel"], "colorectal"),
        (
            &["blood", "leukemia", "lymphoma", "myeloma", "hematologic"],
            "hematologic",
        ),
        (&["prostate"], "prostate"),
        (&["ovary", "ovarian"], "ovarian"),
        (&["melanoma", "skin"], "melanoma"),
    ];
    for (terms, category) in keyword_map {
        if terms.iter().any(|term| diagnosis_lower.contains(term)) {
            return category.to_string();
        }
    }

    let hematologic_indicators = ["wbc", "rbc", "hemoglobin", "platelet", "blast", "lymphocyte"];
    let hematologic_count = findings
        .clinical
        .iter()
        .filter(|f| {
            let title = f.title.to_lowercase();
            hematologic_indicators.iter().any(|ind| title.contains(ind))
        })
        .count();
    if hematologic_count >= 3 {
        return "hematologic".to_string();
    }

    "unknown".to_string()
}

/// Weighted completeness score in [0, 1] plus the list of missing factors.
pub fn calculate_data_completeness_score(
    findings: &FindingsByCategory,
    staging: StagingFields<'_>,
) -> (f32, Vec<String>) {
    let mut score = 0.0f32;
    let mut missing = Vec::new();

    if is_diagnosis_confirmed(findings) {
        score += 0.30;
    } else {
        missing.push("Confirmed pathological diagnosis".to_string());
    }

    if has_imaging_data(findings) {
        score += 0.20;
    } else {
        missing.push("Imaging/radiology data".to_string());
    }

    if is_staging_available(findings, staging) {
        score += 0.20;
    } else {
        missing.push("Cancer staging (TNM)".to_string());
    }

    if has_pathology_confirmation(findings) {
        score += 0.15;
    } else {
        missing.push("Pathology confirmation".to_string());
    }

    let lab_count = findings
        .clinical
        .iter()
        .filter(|f| f.category == "lab")
        .count();
    if lab_count >= 3 {
        score += 0.15;
    } else {
        missing.push("Complete laboratory workup".to_string());
    }

    ((score * 100.0).round() / 100.0, missing)
}

pub fn determine_status(score: f32) -> DiagnosticStatus {
    if score < 0.3 {
        DiagnosticStatus::DiagnosticWorkupRequired
    } else if score < 0.5 {
        DiagnosticStatus::PendingConfirmation
    } else if score < 0.7 {
        DiagnosticStatus::Preliminary
    } else {
        DiagnosticStatus::ReadyForReview
    }
}

/// Scan clinical findings for critical lab values. A hit forces case
/// complexity to `high`.
pub fn check_critical_findings(
    findings: &FindingsByCategory,
) -> (bool, Option<String>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut has_critical = false;

    for finding in &findings.clinical {
        let title = finding.title.to_lowercase();
        let Some(value) = leading_number(&finding.value) else {
            continue;
        };

        if title.contains("hemoglobin") || title.contains("hgb") || title.contains("hb") {
            if value < 7.0 {
                has_critical = true;
                warnings.push(format!("CRITICAL: Severe anemia (Hgb {value} g/dL)"));
            }
        }
        if title.contains("platelet") && value < 50_000.0 {
            has_critical = true;
            warnings.push(format!("CRITICAL: Severe thrombocytopenia (Plt {value})"));
        }
        if title.contains("wbc") || title.contains("leucocyte") || title.contains("leukocyte") {
            if value < 1_000.0 {
                has_critical = true;
                warnings.push(format!("CRITICAL: Severe leukopenia (WBC {value})"));
            } else if value > 50_000.0 {
                has_critical = true;
                warnings.push(format!("CRITICAL: Leukocytosis (WBC {value})"));
            }
        }
        if title.contains("neutrophil") && value < 500.0 {
            has_critical = true;
            warnings.push(format!("CRITICAL: Severe neutropenia (ANC {value})"));
        }
        if title.contains("creatinine") && value > 3.0 {
            has_critical = true;
            warnings.push(format!("CRITICAL: Renal impairment (Creatinine {value} mg/dL)"));
        }
    }

    let complexity = has_critical.then(|| "high".to_string());
    (has_critical, complexity, warnings)
}

/// Main validation entry: decides whether the case is safe for treatment
/// recommendations. Never fails; everything contributes warnings instead.
pub fn validate_for_treatment_recommendations(
    findings: &FindingsByCategory,
    staging: StagingFields<'_>,
) -> ValidationResult {
    let (score, missing) = calculate_data_completeness_score(findings, staging);
    let status = determine_status(score);
    let (_, complexity_override, critical_warnings) = check_critical_findings(findings);

    let mut warnings = critical_warnings;
    if !has_imaging_data(findings) {
        warnings.push(
            "No imaging data available. Imaging required before tumor board conclusions.".into(),
        );
    }
    if !is_diagnosis_confirmed(findings) {
        warnings.push("Diagnosis pending. Treatment recommendations are preliminary only.".into());
    }
    if !has_pathology_confirmation(findings) {
        warnings.push("Pathology confirmation required before treatment initiation.".into());
    }
    if !is_staging_available(findings, staging) {
        warnings.push("Staging data incomplete. Cannot determine treatment eligibility.".into());
    }

    let is_safe = score >= 0.5
        && is_diagnosis_confirmed(findings)
        && has_pathology_confirmation(findings);

    ValidationResult {
        is_safe_for_treatment_recs: is_safe,
        data_completeness_score: score,
        status,
        missing_critical_data: missing,
        warnings,
        complexity_override,
    }
}

/// Keep only biomarkers relevant to the disease category, plus generic
/// markers. Unknown disease leaves the list untouched.
pub fn filter_biomarkers_by_disease(
    biomarkers: Vec<BoardFinding>,
    disease_category: &str,
) -> Vec<BoardFinding> {
    if disease_category == "unknown" {
        return biomarkers;
    }
    let Some((_, relevant)) = DISEASE_BIOMARKERS
        .iter()
        .find(|(category, _)| *category == disease_category)
    else {
        return biomarkers;
    };

    biomarkers
        .into_iter()
        .filter(|marker| {
            let name = marker.title.to_uppercase();
            relevant.iter().any(|r| name.contains(r))
                || GENERIC_BIOMARKERS.iter().any(|g| name.contains(g))
        })
        .collect()
}

/// When the safety gate is closed, retain only diagnostic-intent
/// recommendations; text with diagnostic intent is re-categorized.
pub fn sanitize_recommendations(
    recommendations: Vec<BoardRecommendation>,
    validation: &ValidationResult,
) -> Vec<BoardRecommendation> {
    if validation.is_safe_for_treatment_recs {
        return recommendations;
    }

    let allowed = [
        "diagnostic",
        "imaging",
        "biopsy",
        "referral",
        "workup",
        "consultation",
    ];
    let diagnostic_terms = [
        "confirm", "rule out", "evaluate", "assess", "test", "biopsy", "imaging", "refer",
    ];

    recommendations
        .into_iter()
        .filter_map(|mut rec| {
            let category = rec.category.to_lowercase();
            if allowed.contains(&category.as_str()) {
                return Some(rec);
            }
            let text = rec.text.to_lowercase();
            if diagnostic_terms.iter().any(|term| text.contains(term)) {
                rec.category = "diagnostic".to_string();
                return Some(rec);
            }
            None
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::SeverityLevel;

    fn finding(category: &str, title: &str, value: &str) -> BoardFinding {
        BoardFinding {
            category: category.into(),
            title: title.into(),
            value: value.into(),
            severity: SeverityLevel::Info,
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

    fn confirmed_findings() -> FindingsByCategory {
        FindingsByCategory {
            imaging: vec![finding("tumor", "Right breast mass", "2.1 cm")],
            pathology: vec![finding(
                "diagnosis",
                "Histological Diagnosis",
                "Invasive ductal carcinoma",
            )],
            clinical: vec![
                finding("lab", "Hemoglobin", "12.1"),
                finding("lab", "WBC", "7200"),
                finding("lab", "Platelet", "210000"),
            ],
            biomarkers: vec![],
        }
    }

    #[test]
    fn diagnosis_confirmed_requires_specific_root() {
        assert!(is_diagnosis_confirmed(&confirmed_findings()));

        let mut vague = confirmed_findings();
        vague.pathology[0].value = "blood".into();
        assert!(!is_diagnosis_confirmed(&vague));

        vague.pathology[0].value = "pending".into();
        assert!(!is_diagnosis_confirmed(&vague));

        vague.pathology[0].value = "suspicious mass".into();
        assert!(!is_diagnosis_confirmed(&vague));

        vague.pathology[0].value = "Acute myeloid leukemia".into();
        assert!(is_diagnosis_confirmed(&vague));
    }

    #[test]
    fn pathology_confirmation_rejects_placeholders() {
        let mut findings = FindingsByCategory::default();
        assert!(!has_pathology_confirmation(&findings));

        findings.pathology.push(finding("diagnosis", "Diagnosis", "string"));
        findings.pathology.push(finding("diagnosis", "Diagnosis", "N/A"));
        assert!(!has_pathology_confirmation(&findings));

        findings.pathology.push(finding("grade", "Grade", "Grade 2"));
        assert!(has_pathology_confirmation(&findings));
    }

    #[test]
    fn staging_from_explicit_fields_or_findings() {
        let findings = FindingsByCategory::default();
        assert!(!is_staging_available(&findings, StagingFields::default()));
        assert!(is_staging_available(
            &findings,
            StagingFields {
                tnm: Some("T2N0M0"),
                ..Default::default()
            }
        ));

        let mut with_finding = FindingsByCategory::default();
        with_finding
            .pathology
            .push(finding("staging", "TNM Stage", "T2N0M0"));
        assert!(is_staging_available(&with_finding, StagingFields::default()));

        let mut pending = FindingsByCategory::default();
        pending
            .clinical
            .push(finding("staging", "Clinical stage", "pending"));
        assert!(!is_staging_available(&pending, StagingFields::default()));
    }

    #[test]
    fn disease_category_from_diagnosis_keywords() {
        let findings = FindingsByCategory::default();
        assert_eq!(
            detect_disease_category(&findings, Some("Invasive ductal carcinoma of the breast")),
            "breast"
        );
        assert_eq!(
            detect_disease_category(&findings, Some("Pulmonary adenocarcinoma")),
            "lung"
        );
        assert_eq!(
            detect_disease_category(&findings, Some("Chronic lymphocytic leukemia")),
            "hematologic"
        );
        assert_eq!(detect_disease_category(&findings, None), "unknown");
    }

    #[test]
    fn hematologic_heuristic_needs_three_indicators() {
        let mut findings = FindingsByCategory::default();
        findings.clinical.push(finding("lab", "WBC Count", "7200"));
        findings.clinical.push(finding("lab", "Hemoglobin", "13.2"));
        assert_eq!(detect_disease_category(&findings, None), "unknown");

        findings.clinical.push(finding("lab", "Platelet Count", "210000"));
        assert_eq!(detect_disease_category(&findings, None), "hematologic");
    }

    #[test]
    fn completeness_score_is_bounded_and_missing_is_disjoint() {
        let (score, missing) =
            calculate_data_completeness_score(&FindingsByCategory::default(), StagingFields::default());
        assert_eq!(score, 0.0);
        assert_eq!(missing.len(), 5);

        let findings = confirmed_findings();
        let (score, missing) = calculate_data_completeness_score(
            &findings,
            StagingFields {
                tnm: Some("T2N0M0"),
                ..Default::default()
            },
        );
        // diagnosis + imaging + staging + pathology + labs all present
        assert_eq!(score, 1.0);
        assert!(missing.is_empty());

        // Partial: no imaging, no staging
        let mut partial = confirmed_findings();
        partial.imaging.clear();
        let (score, missing) = calculate_data_completeness_score(&partial, StagingFields::default());
        assert!((0.0..=1.0).contains(&score));
        assert!(missing.contains(&"Imaging/radiology data".to_string()));
        assert!(missing.contains(&"Cancer staging (TNM)".to_string()));
        assert!(!missing.contains(&"Confirmed pathological diagnosis".to_string()));
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(determine_status(0.0), DiagnosticStatus::DiagnosticWorkupRequired);
        assert_eq!(determine_status(0.29), DiagnosticStatus::DiagnosticWorkupRequired);
        assert_eq!(determine_status(0.3), DiagnosticStatus::PendingConfirmation);
        assert_eq!(determine_status(0.49), DiagnosticStatus::PendingConfirmation);
        assert_eq!(determine_status(0.5), DiagnosticStatus::Preliminary);
        assert_eq!(determine_status(0.69), DiagnosticStatus::Preliminary);
        assert_eq!(determine_status(0.7), DiagnosticStatus::ReadyForReview);
        assert_eq!(determine_status(1.0), DiagnosticStatus::ReadyForReview);
    }

    #[test]
    fn critical_thresholds_escalate_complexity() {
        let mut findings = FindingsByCategory::default();
        findings.clinical.push(finding("lab", "Hemoglobin", "6.2 g/dL"));
        findings.clinical.push(finding("lab", "Platelet count", "42000"));
        findings.clinical.push(finding("lab", "WBC count", "62000"));
        findings.clinical.push(finding("lab", "Neutrophil count", "320"));
        findings.clinical.push(finding("lab", "Creatinine", "3.8 mg/dL"));

        let (has_critical, complexity, warnings) = check_critical_findings(&findings);
        assert!(has_critical);
        assert_eq!(complexity.as_deref(), Some("high"));
        assert_eq!(warnings.len(), 5);
        assert!(warnings.iter().any(|w| w.contains("Severe anemia")));
        assert!(warnings.iter().any(|w| w.contains("Leukocytosis")));
        assert!(warnings.iter().any(|w| w.contains("Severe neutropenia")));
        assert!(warnings.iter().any(|w| w.contains("Renal impairment")));
    }

    #[test]
    fn normal_labs_do_not_escalate() {
        let (has_critical, complexity, warnings) = check_critical_findings(&confirmed_findings());
        assert!(!has_critical);
        assert!(complexity.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn non_numeric_values_are_ignored() {
        let mut findings = FindingsByCategory::default();
        findings.clinical.push(finding("lab", "Hemoglobin", "low"));
        let (has_critical, _, _) = check_critical_findings(&findings);
        assert!(!has_critical);
    }

    #[test]
    fn validation_safe_only_with_confirmed_diagnosis_and_evidence() {
        let findings = confirmed_findings();
        let result = validate_for_treatment_recommendations(
            &findings,
            StagingFields {
                tnm: Some("T2N0M0"),
                ..Default::default()
            },
        );
        assert!(result.is_safe_for_treatment_recs);
        assert_eq!(result.status, DiagnosticStatus::ReadyForReview);

        let empty = FindingsByCategory::default();
        let result = validate_for_treatment_recommendations(&empty, StagingFields::default());
        assert!(!result.is_safe_for_treatment_recs);
        assert_eq!(result.status, DiagnosticStatus::DiagnosticWorkupRequired);
        assert!(result.warnings.iter().any(|w| w.contains("Diagnosis pending")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("No imaging data available")));
    }

    #[test]
    fn biomarker_filter_keeps_relevant_and_generic() {
        let biomarkers = vec![
            finding("biomarker", "ER", "Positive 90%"),
            finding("biomarker", "HER2", "Negative"),
            finding("biomarker", "EGFR", "Not tested"),
            finding("biomarker", "LDH", "420"),
        ];
        let filtered = filter_biomarkers_by_disease(biomarkers, "breast");
        let names: Vec<&str> = filtered.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(names, vec!["ER", "HER2", "LDH"]);
    }

    #[test]
    fn biomarker_filter_passthrough_for_unknown_disease() {
        let biomarkers = vec![
            finding("biomarker", "ER", "Positive"),
            finding("biomarker", "EGFR", "Positive"),
        ];
        let filtered = filter_biomarkers_by_disease(biomarkers, "unknown");
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn unsafe_case_keeps_only_diagnostic_intent() {
        let unsafe_validation = validate_for_treatment_recommendations(
            &FindingsByCategory::default(),
            StagingFields::default(),
        );
        let recommendations = vec![
            rec("treatment", "Start FOLFOX chemotherapy"),
            rec("biopsy", "Core needle biopsy of the mass"),
            rec("follow_up", "Evaluate response with repeat imaging"),
            rec("treatment", "Radiation therapy to the primary site"),
        ];

        let sanitized = sanitize_recommendations(recommendations, &unsafe_validation);
        assert_eq!(sanitized.len(), 2);
        assert_eq!(sanitized[0].category, "biopsy");
        // Diagnostic-intent text was re-categorized
        assert_eq!(sanitized[1].category, "diagnostic");
        assert!(sanitized[1].text.contains("Evaluate response"));
    }

    #[test]
    fn safe_case_passes_recommendations_through() {
        let safe_validation = validate_for_treatment_recommendations(
            &confirmed_findings(),
            StagingFields {
                tnm: Some("T2N0M0"),
                ..Default::default()
            },
        );
        let recommendations = vec![rec("treatment", "Start FOLFOX chemotherapy")];
        let sanitized = sanitize_recommendations(recommendations.clone(), &safe_validation);
        assert_eq!(sanitized.len(), 1);
        assert_eq!(sanitized[0].category, "treatment");
    }
}
