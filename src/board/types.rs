//! Agent contract types and the final tumor board view.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════
// Enums
// ═══════════════════════════════════════════

/// The specialized agents in the board pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Radiology,
    Pathology,
    Clinical,
    Research,
    Coordinator,
    Unknown,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Radiology => "radiology",
            Self::Pathology => "pathology",
            Self::Clinical => "clinical",
            Self::Research => "research",
            Self::Coordinator => "coordinator",
            Self::Unknown => "unknown",
        }
    }
}

/// Agent output confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// Verified against source, little ambiguity.
    High,
    /// Some ambiguity in the source.
    Medium,
    /// Significant uncertainty.
    Low,
    /// Cannot determine; insufficient data.
    None,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            "none" => Self::None,
            _ => Self::Medium,
        }
    }
}

/// Severity for findings and priority for recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Critical,
    High,
    Moderate,
    Low,
    Info,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" | "urgent" => Self::High,
            "moderate" | "routine" => Self::Moderate,
            "low" => Self::Low,
            "info" => Self::Info,
            _ => Self::Moderate,
        }
    }
}

// ═══════════════════════════════════════════
// Agent I/O
// ═══════════════════════════════════════════

/// Context passed to each agent for analysis.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub patient_age: Option<String>,
    pub patient_gender: Option<String>,
    pub report_text: String,
    pub report_type: Option<String>,
}

/// A single clinical finding from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistFinding {
    pub category: String,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub severity: SeverityLevel,
    pub confidence: ConfidenceLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
}

impl SpecialistFinding {
    pub fn new(category: &str, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.into(),
            value: value.into(),
            unit: None,
            severity: SeverityLevel::Info,
            confidence: ConfidenceLevel::Medium,
            source_report: None,
            interpretation: None,
        }
    }
}

/// A clinical recommendation from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistRecommendation {
    pub category: String,
    pub text: String,
    pub priority: SeverityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Treatment options always carry this until pathology confirms.
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl SpecialistRecommendation {
    pub fn new(category: &str, text: impl Into<String>, priority: SeverityLevel) -> Self {
        Self {
            category: category.to_string(),
            text: text.into(),
            priority,
            rationale: None,
            evidence_level: None,
            source: None,
            requires_confirmation: false,
        }
    }
}

/// Standardized output from any board agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent_type: AgentType,
    pub agent_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub confidence: ConfidenceLevel,
    #[serde(default)]
    pub findings: Vec<SpecialistFinding>,
    #[serde(default)]
    pub recommendations: Vec<SpecialistRecommendation>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl AgentOutput {
    pub fn empty(agent_type: AgentType, agent_name: &str) -> Self {
        Self {
            agent_type,
            agent_name: agent_name.to_string(),
            success: true,
            error: None,
            confidence: ConfidenceLevel::Medium,
            findings: Vec::new(),
            recommendations: Vec::new(),
            summary: String::new(),
            warnings: Vec::new(),
            timestamp: String::new(),
            patient_id: String::new(),
            processing_time_ms: 0,
        }
    }

    /// Failure output: no findings, zero confidence, error carried as a
    /// warning so it survives into the merged view.
    pub fn failure(agent_type: AgentType, agent_name: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            agent_type,
            agent_name: agent_name.to_string(),
            success: false,
            error: Some(error.clone()),
            confidence: ConfidenceLevel::None,
            findings: Vec::new(),
            recommendations: Vec::new(),
            summary: String::new(),
            warnings: vec![error],
            timestamp: String::new(),
            patient_id: String::new(),
            processing_time_ms: 0,
        }
    }
}

// ═══════════════════════════════════════════
// Tumor board view (final output)
// ═══════════════════════════════════════════

/// A finding as displayed on the board view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardFinding {
    pub category: String,
    pub title: String,
    pub value: String,
    pub severity: SeverityLevel,
    pub source_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
}

/// A recommendation as displayed on the board view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRecommendation {
    pub category: String,
    pub text: String,
    pub priority: SeverityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalTrial {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<String>,
}

/// Findings grouped the way the board reviews them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingsByCategory {
    #[serde(default)]
    pub imaging: Vec<BoardFinding>,
    #[serde(default)]
    pub pathology: Vec<BoardFinding>,
    #[serde(default)]
    pub clinical: Vec<BoardFinding>,
    #[serde(default)]
    pub biomarkers: Vec<BoardFinding>,
}

impl FindingsByCategory {
    pub fn total(&self) -> usize {
        self.imaging.len() + self.pathology.len() + self.clinical.len() + self.biomarkers.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationsByCategory {
    #[serde(default)]
    pub treatment: Vec<BoardRecommendation>,
    #[serde(default)]
    pub imaging: Vec<BoardRecommendation>,
    #[serde(default)]
    pub other: Vec<BoardRecommendation>,
}

/// An inconsistency between agent outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConflict {
    pub description: String,
    #[serde(default)]
    pub agents_involved: Vec<String>,
}

/// Complete tumor board view: what doctors review and what gets persisted
/// on the case record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TumorBoardView {
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_gender: Option<String>,

    #[serde(default)]
    pub case_id: String,
    #[serde(default)]
    pub case_date: String,
    #[serde(default)]
    pub generated_at: String,

    #[serde(default)]
    pub executive_summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pathological_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tnm_staging: Option<String>,

    #[serde(default)]
    pub findings: FindingsByCategory,
    #[serde(default)]
    pub recommendations: RecommendationsByCategory,
    #[serde(default)]
    pub clinical_trials: Vec<ClinicalTrial>,

    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<BoardConflict>,

    #[serde(default)]
    pub overall_confidence: String,

    // Attached by the cleaner / validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_disease_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_completeness_score: Option<f32>,
    #[serde(default)]
    pub missing_critical_data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_justification: Option<String>,

    // Attached by the orchestration overlay, when enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration: Option<serde_json::Value>,

    #[serde(default)]
    pub processing_time_seconds: f64,
    #[serde(default)]
    pub agents_used: Vec<String>,
}

impl TumorBoardView {
    pub fn new(patient_id: &str, patient_name: &str) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            patient_name: patient_name.to_string(),
            patient_age: None,
            patient_gender: None,
            case_id: String::new(),
            case_date: String::new(),
            generated_at: String::new(),
            executive_summary: String::new(),
            clinical_stage: None,
            pathological_stage: None,
            tnm_staging: None,
            findings: FindingsByCategory::default(),
            recommendations: RecommendationsByCategory::default(),
            clinical_trials: Vec::new(),
            warnings: Vec::new(),
            conflicts: Vec::new(),
            overall_confidence: "medium".into(),
            detected_disease_category: None,
            diagnostic_status: None,
            data_completeness_score: None,
            missing_critical_data: Vec::new(),
            case_complexity: None,
            confidence_score: None,
            confidence_justification: None,
            orchestration: None,
            processing_time_seconds: 0.0,
            agents_used: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&AgentType::Radiology).unwrap(), "\"radiology\"");
        assert_eq!(serde_json::to_string(&ConfidenceLevel::None).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&SeverityLevel::Info).unwrap(), "\"info\"");
    }

    #[test]
    fn confidence_parse_defaults_to_medium() {
        assert_eq!(ConfidenceLevel::parse("HIGH"), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::parse("none"), ConfidenceLevel::None);
        assert_eq!(ConfidenceLevel::parse("certain"), ConfidenceLevel::Medium);
    }

    #[test]
    fn severity_parse_maps_priority_synonyms() {
        assert_eq!(SeverityLevel::parse("urgent"), SeverityLevel::High);
        assert_eq!(SeverityLevel::parse("routine"), SeverityLevel::Moderate);
        assert_eq!(SeverityLevel::parse("weird"), SeverityLevel::Moderate);
    }

    #[test]
    fn failure_output_carries_error_as_warning() {
        let output = AgentOutput::failure(AgentType::Pathology, "Pathology Agent", "No valid JSON");
        assert!(!output.success);
        assert_eq!(output.confidence, ConfidenceLevel::None);
        assert_eq!(output.warnings, vec!["No valid JSON"]);
        assert!(output.findings.is_empty());
    }

    #[test]
    fn view_roundtrips_through_json() {
        let mut view = TumorBoardView::new("p-1", "Jane Doe");
        view.findings.imaging.push(BoardFinding {
            category: "tumor".into(),
            title: "Right upper lobe".into(),
            value: "3.2 x 2.1".into(),
            severity: SeverityLevel::High,
            source_agent: "radiology".into(),
            source_report: None,
            interpretation: None,
        });
        view.clinical_trials.push(ClinicalTrial {
            name: "NCT01234567".into(),
            source: None,
            eligibility: Some("EGFR+".into()),
        });

        let json = serde_json::to_string(&view).unwrap();
        let parsed: TumorBoardView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.findings.imaging.len(), 1);
        assert_eq!(parsed.findings.total(), 1);
        assert_eq!(parsed.clinical_trials[0].name, "NCT01234567");
        assert_eq!(parsed.overall_confidence, "medium");
    }
}
