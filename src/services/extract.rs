//! Tolerant extraction of JSON objects from generative model text.
//!
//! Models are asked for pure JSON but sometimes wrap it in prose or code
//! fences. Three pure tiers are tried in order: the whole text, the first
//! balanced `{...}` span, then everything between the first `{` and the
//! last `}`. Anything else is reported, never silently accepted.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Maximum characters of offending text kept in error messages.
const PREVIEW_CHARS: usize = 200;

/// Outcome of locating a JSON object in free text.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Parsed(Value),
    /// Braces were present but no candidate parsed.
    Malformed { preview: String, reason: String },
    /// No JSON object could be located at all.
    Absent { preview: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("No JSON object found in model output: {preview:?}")]
    Absent { preview: String },

    #[error("Malformed JSON in model output ({reason}): {preview:?}")]
    Malformed { preview: String, reason: String },

    #[error("Model output JSON does not match expected shape ({reason}): {preview:?}")]
    Shape { preview: String, reason: String },
}

/// Tier 1: the whole text is a JSON object.
pub fn parse_direct(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str::<Value>(text.trim()).and_then(require_object)
}

/// Tier 2: the first balanced `{...}` span, skipping braces inside strings.
pub fn parse_first_balanced(text: &str) -> Option<Result<Value, serde_json::Error>> {
    let span = first_balanced_span(text)?;
    Some(serde_json::from_str::<Value>(span).and_then(require_object))
}

/// Tier 3: from the first `{` to the last `}`.
pub fn parse_outer_braces(text: &str) -> Option<Result<Value, serde_json::Error>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(serde_json::from_str::<Value>(&text[start..=end]).and_then(require_object))
}

/// Run the three tiers and tag the outcome.
pub fn extract_json(text: &str) -> Extraction {
    if let Ok(value) = parse_direct(text) {
        return Extraction::Parsed(value);
    }

    let mut last_error = None;
    for tier in [parse_first_balanced, parse_outer_braces] {
        match tier(text) {
            Some(Ok(value)) => return Extraction::Parsed(value),
            Some(Err(e)) => last_error = Some(e.to_string()),
            None => {}
        }
    }

    match last_error {
        Some(reason) => Extraction::Malformed {
            preview: preview(text),
            reason,
        },
        None => Extraction::Absent {
            preview: preview(text),
        },
    }
}

/// Locate a JSON object in raw model text, failing with a descriptive error.
pub fn extract_value(text: &str) -> Result<Value, ExtractError> {
    match extract_json(text) {
        Extraction::Parsed(value) => Ok(value),
        Extraction::Malformed { preview, reason } => Err(ExtractError::Malformed { preview, reason }),
        Extraction::Absent { preview } => Err(ExtractError::Absent { preview }),
    }
}

/// Deserialize an already-extracted object into `T`.
pub fn from_extracted<T: DeserializeOwned>(value: Value, text: &str) -> Result<T, ExtractError> {
    serde_json::from_value(value).map_err(|e| ExtractError::Shape {
        preview: preview(text),
        reason: e.to_string(),
    })
}

/// Extract and deserialize a structured payload from raw model text.
pub fn extract_structured<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    from_extracted(extract_value(text)?, text)
}

fn require_object(value: Value) -> Result<Value, serde_json::Error> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom("expected a JSON object"))
    }
}

fn first_balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}
