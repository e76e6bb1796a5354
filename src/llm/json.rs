//! JSON extraction and repair for LLM responses.
//!
//! Models wrap JSON in markdown fences, lead with prose, use single quotes,
//! and leave trailing commas. The helpers here strip all of that before
//! handing the payload to serde.

use super::LlmError;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

/// Extract the JSON object from a raw model response.
///
/// Strips markdown code fences, then slices from the first `{` to the last
/// `}` so surrounding prose is discarded.
pub fn extract_json(text: &str) -> &str {
    let mut t = text.trim();

    if let Some(idx) = t.find("```json") {
        t = &t[idx + 7..];
        if let Some(end) = t.find("```") {
            t = &t[..end];
        }
    } else if let Some(idx) = t.find("```") {
        t = &t[idx + 3..];
        if let Some(end) = t.find("```") {
            t = &t[..end];
        }
    }
    t = t.trim();

    match (t.find('{'), t.rfind('}')) {
        (Some(start), Some(end)) if end > start => &t[start..=end],
        _ => t,
    }
}

fn trailing_comma_obj() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*\}").unwrap_or_else(|_| unreachable!()))
}

fn trailing_comma_arr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*\]").unwrap_or_else(|_| unreachable!()))
}

/// Apply common repairs: single quotes to double quotes, trailing commas
/// removed. Only used after a strict parse has already failed.
pub fn repair_json(text: &str) -> String {
    let repaired = text.replace('\'', "\"");
    let repaired = trailing_comma_obj().replace_all(&repaired, "}");
    trailing_comma_arr().replace_all(&repaired, "]").into_owned()
}

/// Parse an LLM response leniently: extract, try strict, then repair.
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let extracted = extract_json(raw);

    match serde_json::from_str::<T>(extracted) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let repaired = repair_json(extracted);
            serde_json::from_str::<T>(&repaired)
                .map_err(|_| LlmError::Parse(strict_err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_extract_from_json_fence() {
        let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nHope that helps!";
        assert_eq!(extract_json(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_from_bare_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_from_surrounding_prose() {
        let raw = "The plan is {\"tasks\": []} as requested.";
        assert_eq!(extract_json(raw), "{\"tasks\": []}");
    }

    #[test]
    fn test_repair_trailing_commas() {
        let broken = r#"{"tasks": [1, 2,], "intent": "x",}"#;
        let value: Value = serde_json::from_str(&repair_json(broken)).unwrap();
        assert_eq!(value["tasks"][1], 2);
    }

    #[test]
    fn test_repair_single_quotes() {
        let broken = "{'intent': 'diagnose_drop'}";
        let value: Value = serde_json::from_str(&repair_json(broken)).unwrap();
        assert_eq!(value["intent"], "diagnose_drop");
    }

    #[test]
    fn test_parse_lenient_reports_original_error() {
        let result: Result<Value, _> = parse_lenient("totally not json");
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }
}
