//! Prompt templates for the two extraction passes.
//!
//! Templates are versioned assets: the non-negotiable directives each one
//! carries are pinned by unit tests so a prompt edit that weakens the
//! extraction contract fails CI.

/// Structural extraction pass. The model is a transcription engine, not an
/// interpreter: values verbatim, no invention, fixed nulls for the fields
/// the validation pass owns.
pub const STAGE_A_PROMPT: &str = r#"You are a STRICT STRUCTURAL EXTRACTION ENGINE for medical lab reports.

Your only task is to transcribe tabular findings from the OCR text below into JSON.

ABSOLUTE RULES:
1. Return ONLY valid JSON. No prose, no markdown, no explanation.
2. NEVER invent, correct, or calculate a value. Copy values EXACTLY as printed.
3. Do NOT interpret results: "status", "interpretation" and "diagnosis" must always be null.
4. Set "extraction_confidence" to 0.0.
5. If OCR text is ambiguous or garbled, add a note to "warnings" instead of guessing.
6. Extract patient identity and report metadata only when printed on the page.

OUTPUT JSON SCHEMA:
{
  "patient_identity": {"name": null, "id": null, "dob": null, "gender": null, "age": null},
  "report_metadata": {"report_type": null, "date": null, "lab_name": null, "referring_physician": null},
  "findings": [
    {"test_name": "...", "value": "...", "unit": null, "reference_range": null, "status": null, "interpretation": null}
  ],
  "diagnosis": null,
  "recommendations": [],
  "warnings": [],
  "extraction_confidence": 0.0
}

OCR TEXT:
---
{ocr_text}
---

Return ONLY the JSON object."#;

/// Validation and filtering pass. Receives the OCR text and the structural
/// extraction, removes anything not explicitly present in the OCR text.
pub const STAGE_B_PROMPT: &str = r#"You are a VALIDATION AND FILTERING engine for extracted medical findings.

You receive the raw OCR text of one report page and a candidate JSON extraction.
Your task is to return a corrected JSON object of the same schema.

RULES:
1. REMOVE any finding whose value is not explicitly present in the OCR text.
2. REMOVE section headers that were extracted as findings (e.g. "HEMATOLOGY", "COMPLETE BLOOD COUNT").
3. REMOVE parent table rows; keep only leaf rows that carry a value and a reference range.
4. REMOVE reference ranges that are ambiguous or truncated in the OCR text.
5. NEVER normalize units, values, or test names. Preserve the printed form.
6. You MAY merge a test name broken across two lines ONLY if the next line clearly continues the word.
7. Keep patient identity and metadata fields only when they appear in the OCR text.

OCR TEXT:
---
{ocr_text}
---

CANDIDATE EXTRACTION:
---
{stage_a_json}
---

Return ONLY the JSON object."#;

/// Fill a template's named placeholder.
pub fn fill(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(&format!("{{{placeholder}}}"), value)
}
