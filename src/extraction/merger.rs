//! Cross-page merger: N page analyses → one document analysis.
//!
//! Identity and metadata take the first non-null value in page order.
//! Findings deduplicate on the lowercased, trimmed test name; a collision
//! replaces the held entry only when the newer page's extraction
//! confidence is strictly greater, so ties keep the earlier page and the
//! merge is deterministic under stable reordering.

use super::types::{DocumentAnalysis, Finding, PageAnalysis, PatientIdentity, ReportMetadata};

struct HeldFinding {
    finding: Finding,
    page_number: usize,
    confidence: f32,
    /// Position in the output ordering.
    slot: usize,
}

/// Merge ordered page analyses into a document analysis.
pub fn merge_pages(pages: &[PageAnalysis]) -> DocumentAnalysis {
    let mut identity = PatientIdentity::default();
    let mut metadata = ReportMetadata::default();
    let mut merge_warnings: Vec<String> = Vec::new();

    let mut held: Vec<HeldFinding> = Vec::new();
    let mut diagnoses: Vec<String> = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();

    for page in pages {
        merge_identity(&mut identity, &page.patient_identity);
        merge_metadata(&mut metadata, &page.report_metadata);

        for finding in &page.findings {
            let key = finding.test_name.trim().to_lowercase();
            if key.is_empty() {
                // Nameless findings never collide; pass them through.
                let slot = held.len();
                held.push(HeldFinding {
                    finding: finding.clone(),
                    page_number: page.page_number,
                    confidence: page.extraction_confidence,
                    slot,
                });
                continue;
            }

            let existing = held
                .iter_mut()
                .find(|h| h.finding.test_name.trim().to_lowercase() == key);
            match existing {
                None => {
                    let slot = held.len();
                    held.push(HeldFinding {
                        finding: finding.clone(),
                        page_number: page.page_number,
                        confidence: page.extraction_confidence,
                        slot,
                    });
                }
                Some(entry) => {
                    if entry.finding.unit != finding.unit {
                        merge_warnings.push(format!(
                            "Unit conflict for {}: '{}' (page {}) vs '{}' (page {})",
                            finding.test_name,
                            entry.finding.unit.as_deref().unwrap_or(""),
                            entry.page_number,
                            finding.unit.as_deref().unwrap_or(""),
                            page.page_number,
                        ));
                    }
                    if page.extraction_confidence > entry.confidence {
                        merge_warnings.push(format!(
                            "Replaced finding '{}' from page {} with page {} (higher extraction confidence)",
                            finding.test_name, entry.page_number, page.page_number,
                        ));
                        entry.finding = finding.clone();
                        entry.page_number = page.page_number;
                        entry.confidence = page.extraction_confidence;
                    }
                }
            }
        }

        if let Some(diagnosis) = &page.diagnosis {
            if !diagnosis.trim().is_empty() && !diagnoses.contains(diagnosis) {
                diagnoses.push(diagnosis.clone());
            }
        }
        for rec in &page.recommendations {
            if !rec.trim().is_empty() && !recommendations.contains(rec) {
                recommendations.push(rec.clone());
            }
        }
    }

    held.sort_by_key(|h| h.slot);
    let all_findings = held.into_iter().map(|h| h.finding).collect();

    DocumentAnalysis {
        patient_identity: identity,
        report_metadata: metadata,
        all_findings,
        diagnoses,
        recommendations,
        aggregate_confidence: aggregate_confidence(pages),
        merge_warnings,
    }
}

fn merge_identity(into: &mut PatientIdentity, from: &PatientIdentity) {
    if into.name.is_none() {
        into.name = from.name.clone();
    }
    if into.id.is_none() {
        into.id = from.id.clone();
    }
    if into.dob.is_none() {
        into.dob = from.dob.clone();
    }
    if into.gender.is_none() {
        into.gender = from.gender.clone();
    }
    if into.age.is_none() {
        into.age = from.age.clone();
    }
}

fn merge_metadata(into: &mut ReportMetadata, from: &ReportMetadata) {
    if into.report_type.is_none() {
        into.report_type = from.report_type.clone();
    }
    if into.date.is_none() {
        into.date = from.date.clone();
    }
    if into.lab_name.is_none() {
        into.lab_name = from.lab_name.clone();
    }
    if into.referring_physician.is_none() {
        into.referring_physician = from.referring_physician.clone();
    }
}

/// Mean page confidence restricted to pages that reported one, rounded to
/// two decimals. Zero when no page contributes.
fn aggregate_confidence(pages: &[PageAnalysis]) -> f32 {
    let contributing: Vec<f32> = pages
        .iter()
        .map(|p| p.extraction_confidence)
        .filter(|&c| c > 0.0)
        .collect();
    if contributing.is_empty() {
        return 0.0;
    }
    let mean = contributing.iter().sum::<f32>() / contributing.len() as f32;
    (mean * 100.0).round() / 100.0
}
