//! Evidence-based confidence scoring.
//!
//! Replaces model-reported confidence with a score derived from what
//! evidence is actually on the table. The model never gets to be more
//! confident than the data allows.

use serde::{Deserialize, Serialize};

use super::validation::StagingFields;
use super::types::FindingsByCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Insufficient data.
    VeryLow,
    /// Major gaps.
    Low,
    /// Some gaps.
    Moderate,
    /// Sufficient data.
    High,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

/// Per-factor contributions, already weighted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub diagnosis: f32,
    pub imaging: f32,
    pub staging: f32,
    pub biomarkers: f32,
    pub labs: f32,
}

#[derive(Debug, Clone)]
pub struct ConfidenceAssessment {
    pub level: ConfidenceTier,
    pub score: f32,
    pub factors: ConfidenceFactors,
    pub justification: String,
}

const PLACEHOLDERS: &[&str] = &["string", "unknown", "n/a", "null", "none", ""];

fn valid_value(value: &str) -> bool {
    !PLACEHOLDERS.contains(&value.trim().to_lowercase().as_str())
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Calculate confidence from objective evidence availability.
pub fn calculate_evidence_based_confidence(
    findings: &FindingsByCategory,
    staging: StagingFields<'_>,
) -> ConfidenceAssessment {
    let factors = ConfidenceFactors {
        diagnosis: round2(assess_diagnosis_quality(findings) * 0.30),
        imaging: round2(assess_imaging_coverage(findings) * 0.20),
        staging: round2(assess_staging_completeness(findings, staging) * 0.20),
        biomarkers: round2(assess_biomarker_quality(findings) * 0.15),
        labs: round2(assess_lab_completeness(findings) * 0.15),
    };

    let score = round2(
        factors.diagnosis + factors.imaging + factors.staging + factors.biomarkers + factors.labs,
    );

    let level = if score < 0.30 {
        ConfidenceTier::VeryLow
    } else if score < 0.50 {
        ConfidenceTier::Low
    } else if score < 0.70 {
        ConfidenceTier::Moderate
    } else {
        ConfidenceTier::High
    };

    let justification = justification_for(&factors, level);

    ConfidenceAssessment {
        level,
        score,
        factors,
        justification,
    }
}

fn assess_diagnosis_quality(findings: &FindingsByCategory) -> f32 {
    let mut score = 0.0f32;
    for finding in &findings.pathology {
        if finding.category.to_lowercase() != "diagnosis" {
            continue;
        }
        let value = finding.value.trim().to_lowercase();
        if value.is_empty() {
            continue;
        }
        let specific = ["carcinoma", "adenocarcinoma", "lymphoma", "leukemia", "sarcoma"];
        let descriptive = ["malignant", "neoplasm", "tumor"];
        if specific.iter().any(|term| value.contains(term)) {
            return 1.0;
        }
        if descriptive.iter().any(|term| value.contains(term)) {
            score = score.max(0.7);
        } else if valid_value(&value) && !value.contains("pending") {
            score = score.max(0.4);
        }
    }
    score
}

fn assess_imaging_coverage(findings: &FindingsByCategory) -> f32 {
    match findings.imaging.len() {
        0 => 0.0,
        1..=2 => 0.5,
        3..=4 => 0.8,
        _ => 1.0,
    }
}

fn assess_staging_completeness(findings: &FindingsByCategory, staging: StagingFields<'_>) -> f32 {
    let mut score = 0.0f32;
    if staging.tnm.is_some_and(|s| !s.trim().is_empty()) {
        score += 0.4;
    }
    if staging.clinical.is_some_and(|s| !s.trim().is_empty()) {
        score += 0.3;
    }
    if staging.pathological.is_some_and(|s| !s.trim().is_empty()) {
        score += 0.3;
    }

    for finding in findings.pathology.iter().chain(findings.clinical.iter()) {
        let title = finding.title.to_lowercase();
        if (title.contains("stage") || title.contains("tnm"))
            && valid_value(&finding.value)
            && !finding.value.to_lowercase().contains("pending")
        {
            score = (score + 0.3).min(1.0);
        }
    }

    score.min(1.0)
}

fn assess_biomarker_quality(findings: &FindingsByCategory) -> f32 {
    let valid = findings
        .biomarkers
        .iter()
        .filter(|f| valid_value(&f.value))
        .count();
    match valid {
        0 if findings.biomarkers.is_empty() => 0.0,
        0 => 0.0,
        1 => 0.4,
        2..=3 => 0.7,
        _ => 1.0,
    }
}

fn assess_lab_completeness(findings: &FindingsByCategory) -> f32 {
    let labs: Vec<_> = findings
        .clinical
        .iter()
        .filter(|f| f.category == "lab")
        .collect();
    if labs.is_empty() {
        return 0.0;
    }
    let valid = labs.iter().filter(|f| valid_value(&f.value)).count();
    match valid {
        0..=1 => 0.2,
        2..=4 => 0.4,
        5..=9 => 0.7,
        _ => 1.0,
    }
}

fn justification_for(factors: &ConfidenceFactors, level: ConfidenceTier) -> String {
    let named = [
        ("diagnosis", factors.diagnosis),
        ("imaging", factors.imaging),
        ("staging", factors.staging),
        ("biomarkers", factors.biomarkers),
        ("labs", factors.labs),
    ];
    let weak: Vec<&str> = named
        .iter()
        .filter(|(_, value)| *value < 0.1)
        .map(|(name, _)| *name)
        .collect();

    match level {
        ConfidenceTier::VeryLow => format!(
            "Insufficient data for reliable conclusions. Missing: {}.",
            if weak.is_empty() {
                "multiple factors".to_string()
            } else {
                weak.join(", ")
            }
        ),
        ConfidenceTier::Low => {
            "Major data gaps present. Requires additional workup before treatment decisions."
                .to_string()
        }
        ConfidenceTier::Moderate => {
            "Some data gaps exist. Recommendations are preliminary pending complete workup."
                .to_string()
        }
        ConfidenceTier::High => "Sufficient evidence available for tumor board review.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{BoardFinding, SeverityLevel};

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

    #[test]
    fn empty_case_is_very_low() {
        let assessment = calculate_evidence_based_confidence(
            &FindingsByCategory::default(),
            StagingFields::default(),
        );
        assert_eq!(assessment.level, ConfidenceTier::VeryLow);
        assert_eq!(assessment.score, 0.0);
        assert!(assessment.justification.contains("Insufficient data"));
        assert!(assessment.justification.contains("diagnosis"));
    }

    #[test]
    fn complete_case_is_high() {
        let findings = FindingsByCategory {
            imaging: (0..5)
                .map(|i| finding("tumor", &format!("Lesion {i}"), "present"))
                .collect(),
            pathology: vec![
                finding("diagnosis", "Histological Diagnosis", "Invasive ductal carcinoma"),
                finding("staging", "TNM Stage", "T2N0M0"),
            ],
            clinical: (0..10)
                .map(|i| finding("lab", &format!("Lab {i}"), "normal value"))
                .collect(),
            biomarkers: vec![
                finding("biomarker", "ER", "Positive"),
                finding("biomarker", "PR", "Positive"),
                finding("biomarker", "HER2", "Negative"),
                finding("biomarker", "Ki-67", "15%"),
            ],
        };
        let assessment = calculate_evidence_based_confidence(
            &findings,
            StagingFields {
                tnm: Some("T2N0M0"),
                clinical: Some("Stage IIA"),
                pathological: Some("pT2"),
            },
        );
        assert_eq!(assessment.level, ConfidenceTier::High);
        assert!(assessment.score >= 0.9, "score: {}", assessment.score);
        assert!(assessment.justification.contains("Sufficient evidence"));
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let findings = FindingsByCategory {
            imaging: (0..20).map(|i| finding("tumor", &format!("L{i}"), "x")).collect(),
            pathology: vec![finding("diagnosis", "Dx", "adenocarcinoma")],
            clinical: (0..30).map(|i| finding("lab", &format!("Lab{i}"), "1")).collect(),
            biomarkers: (0..9).map(|i| finding("biomarker", &format!("B{i}"), "pos")).collect(),
        };
        let assessment = calculate_evidence_based_confidence(
            &findings,
            StagingFields {
                tnm: Some("T1N0M0"),
                clinical: Some("I"),
                pathological: Some("pT1"),
            },
        );
        assert!(assessment.score <= 1.0);
        assert!(assessment.score >= 0.0);
    }

    #[test]
    fn descriptive_diagnosis_scores_partial() {
        let mut findings = FindingsByCategory::default();
        findings
            .pathology
            .push(finding("diagnosis", "Dx", "malignant neoplasm suspected"));
        assert_eq!(assess_diagnosis_quality(&findings), 0.7);

        findings.pathology[0].value = "atypical cells noted".into();
        assert_eq!(assess_diagnosis_quality(&findings), 0.4);

        findings.pathology[0].value = "pending".into();
        assert_eq!(assess_diagnosis_quality(&findings), 0.0);
    }

    #[test]
    fn placeholder_biomarkers_do_not_count() {
        let mut findings = FindingsByCategory::default();
        findings.biomarkers.push(finding("biomarker", "ER", "string"));
        findings.biomarkers.push(finding("biomarker", "PR", "unknown"));
        assert_eq!(assess_biomarker_quality(&findings), 0.0);

        findings.biomarkers.push(finding("biomarker", "HER2", "Negative"));
        assert_eq!(assess_biomarker_quality(&findings), 0.4);
    }

    #[test]
    fn tier_boundaries() {
        // Diagnosis alone: 0.30 weighted -> low tier
        let mut findings = FindingsByCategory::default();
        findings
            .pathology
            .push(finding("diagnosis", "Dx", "adenocarcinoma"));
        let assessment =
            calculate_evidence_based_confidence(&findings, StagingFields::default());
        assert_eq!(assessment.score, 0.3);
        assert_eq!(assessment.level, ConfidenceTier::Low);
    }
}
