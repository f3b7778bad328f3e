//! Tolerant JSON parsing for LLM responses.
//!
//! Models occasionally violate the JSON-mode contract: they wrap output in
//! code fences, prepend prose, or trail commentary after the object. Every
//! component that parses an LLM response goes through this one helper:
//! strict parse first, then fence extraction, then the first balanced-brace
//! substring.

/// Parse an LLM response as JSON, tolerating common contract violations.
/// Returns `None` only when no parseable object can be recovered.
pub fn parse_tolerant_json(response: &str) -> Option<serde_json::Value> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    // 1. Strict parse
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // 2. Code-fence extraction (handles ```json, ```JSON, bare ```)
    if let Some(inner) = extract_fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Some(value);
        }
    }

    // 3. First balanced-brace substring. An unbalanced earlier brace must
    // not poison the scan, so retry from each subsequent opening brace.
    let mut search_from = 0;
    while let Some(offset) = trimmed[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(candidate) = balanced_braces_from(trimmed, start) {
            if let Ok(value) = serde_json::from_str(candidate) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Extract the contents of the first fenced code block, if any.
/// Fence detection is case-insensitive for the `json` language tag.
fn extract_fenced_block(response: &str) -> Option<&str> {
    let lower = response.to_lowercase();
    let fence_start = lower.find("```")?;
    let after_fence = &response[fence_start + 3..];

    // Skip the language tag line if present
    let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_fence[content_start..];

    let fence_end = content.find("```")?;
    Some(&content[..fence_end])
}

/// The substring spanning balanced braces starting at `start`.
/// String-literal aware so braces inside JSON strings don't confuse depth.
fn balanced_braces_from(response: &str, start: usize) -> Option<&str> {
    let bytes = response.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
