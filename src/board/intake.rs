//! Case intake: turns a completed document-analysis payload into the three
//! textual inputs the specialist agents consume.
//!
//! Classification is keyword-driven on the test name — imaging terms to
//! the radiology bucket, pathology/hematology terms to the pathology
//! bucket, everything else to the clinical bucket.

use crate::analysis::{AnalysisResultPayload, ReportStatus};
use crate::extraction::Finding;

// Short abbreviations match as whole words only; "ct" as a substring would
// swallow names like "Direct Bilirubin".
const IMAGING_WORDS: &[&str] = &["ct", "mri", "pet", "usg", "xray", "x-ray", "scan"];
const IMAGING_SUBSTRINGS: &[&str] = &[
    "ultrasound", "imaging", "radiograph", "mammo", "lesion", "nodule", "tumor size",
];

const PATHOLOGY_WORDS: &[&str] = &["wbc", "rbc", "mcv", "mch", "mchc", "esr", "hb"];
const PATHOLOGY_SUBSTRINGS: &[&str] = &[
    "biopsy", "histopath", "pathology", "cytology", "immunohist", "marrow", "smear", "blast",
    "hemoglobin", "haemoglobin", "platelet", "reticulocyte", "neutrophil", "lymphocyte",
    "monocyte", "eosinophil", "basophil", "flow cytometry", "cd marker",
];

/// Which specialist bucket a finding lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingBucket {
    Imaging,
    Pathology,
    Clinical,
}

pub fn classify_finding(test_name: &str) -> FindingBucket {
    let lower = test_name.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| IMAGING_WORDS.contains(w))
        || IMAGING_SUBSTRINGS.iter().any(|term| lower.contains(term))
    {
        return FindingBucket::Imaging;
    }
    if words.iter().any(|w| PATHOLOGY_WORDS.contains(w))
        || PATHOLOGY_SUBSTRINGS.iter().any(|term| lower.contains(term))
    {
        return FindingBucket::Pathology;
    }
    FindingBucket::Clinical
}

/// Textual agent inputs assembled from a document-analysis payload.
#[derive(Debug, Clone, Default)]
pub struct BoardInputs {
    pub imaging_text: String,
    pub pathology_text: String,
    pub clinical_text: String,
    pub finding_count: usize,
}

impl BoardInputs {
    pub fn is_empty(&self) -> bool {
        self.finding_count == 0
            && self.imaging_text.is_empty()
            && self.pathology_text.is_empty()
            && self.clinical_text.is_empty()
    }
}

fn finding_line(finding: &Finding) -> String {
    let mut line = format!("{}: {}", finding.test_name.trim(), finding.value.trim());
    if let Some(unit) = &finding.unit {
        line.push(' ');
        line.push_str(unit.trim());
    }
    if let Some(range) = &finding.reference_range {
        line.push_str(&format!(" (ref: {})", range.trim()));
    }
    line
}

/// Build the three agent inputs from an analysis payload. Findings keep
/// their document order; diagnoses join the pathology bucket and
/// document-level recommendations the clinical bucket.
pub fn build_board_inputs(payload: &AnalysisResultPayload) -> BoardInputs {
    let mut imaging = Vec::new();
    let mut pathology = Vec::new();
    let mut clinical = Vec::new();
    let mut finding_count = 0usize;

    for report in &payload.results {
        if report.status != ReportStatus::Success {
            continue;
        }
        let Some(analysis) = &report.analysis else {
            continue;
        };

        for finding in &analysis.all_findings {
            if finding.test_name.trim().is_empty() && finding.value.trim().is_empty() {
                continue;
            }
            finding_count += 1;
            let line = finding_line(finding);
            match classify_finding(&finding.test_name) {
                FindingBucket::Imaging => imaging.push(line),
                FindingBucket::Pathology => pathology.push(line),
                FindingBucket::Clinical => clinical.push(line),
            }
        }

        for diagnosis in &analysis.diagnoses {
            pathology.push(format!("Diagnosis: {diagnosis}"));
        }
        for recommendation in &analysis.recommendations {
            clinical.push(format!("Recommendation: {recommendation}"));
        }
    }

    BoardInputs {
        imaging_text: imaging.join("\n"),
        pathology_text: pathology.join("\n"),
        clinical_text: clinical.join("\n"),
        finding_count,
    }
}
