//! Recovers a single JSON object from free-form model output.
//!
//! Stages run cheapest first and stop at the first success:
//! 1. the trimmed text parsed as-is
//! 2. the text with a leading/trailing code fence removed
//! 3. the first balanced `{...}` span inside the fence-stripped text
//!
//! Only objects are accepted. Arrays, scalars and unbalanced spans yield `None`.

use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

const FENCE: &str = "```";

pub fn coerce(text: &str) -> Option<JsonObject> {
    let trimmed = text.trim();
    if let Some(object) = parse_object(trimmed) {
        return Some(object);
    }

    let unfenced = strip_fences(trimmed);
    if let Some(object) = parse_object(unfenced) {
        return Some(object);
    }

    extract_first_object(unfenced).and_then(parse_object)
}

/// Removes a leading fence marker (optionally tagged `json`) and a trailing
/// fence marker, then trims.
pub fn strip_fences(text: &str) -> &str {
    let mut body = text.trim_start();
    if let Some(rest) = body.strip_prefix(FENCE) {
        body = rest.strip_prefix("json").unwrap_or(rest);
    }

    let mut body = body.trim();
    if let Some(rest) = body.strip_suffix(FENCE) {
        body = rest;
    }
    body.trim()
}

/// Shortest span starting at the first `{` whose braces balance. Braces
/// inside string literals are counted like any other.
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

fn parse_object(text: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}
