//! Recovery of a JSON object from free-text model output.
//!
//! Models asked for JSON still wrap it in preambles, markdown fences or
//! trailing commentary. Extraction runs an ordered list of pure attempts and
//! keeps the first that yields a JSON object; an attempt that parses to an
//! array or scalar counts as a miss.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Characters of raw text kept in an [`ExtractionError`].
pub const EXCERPT_CHARS: usize = 100;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("fenced block pattern is valid")
});

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to parse oracle response: {excerpt}...")]
pub struct ExtractionError {
    /// Leading characters of the raw text, for user-facing diagnostics.
    pub excerpt: String,
}

impl ExtractionError {
    fn from_raw(raw: &str) -> Self {
        Self {
            excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
        }
    }
}

type Attempt = fn(&str) -> Option<Map<String, Value>>;

/// Attempts in the order they are tried.
const ATTEMPTS: &[(&str, Attempt)] = &[
    ("whole_text", parse_whole),
    ("fenced_block", parse_fenced),
    ("outer_braces", parse_outer_braces),
    ("first_balanced_object", parse_first_balanced),
];

/// Extract the first well-formed JSON object from `raw`.
pub fn extract_structured(raw: &str) -> Result<Map<String, Value>, ExtractionError> {
    for (idx, (name, attempt)) in ATTEMPTS.iter().enumerate() {
        if let Some(object) = attempt(raw) {
            if idx > 0 {
                tracing::debug!(attempt = *name, "recovered JSON object from noisy response");
            }
            return Ok(object);
        }
    }
    Err(ExtractionError::from_raw(raw))
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_whole(raw: &str) -> Option<Map<String, Value>> {
    parse_object(raw)
}

/// First fenced code block, optionally tagged `json`.
fn parse_fenced(raw: &str) -> Option<Map<String, Value>> {
    FENCED_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|body| parse_object(body.as_str()))
}

/// Substring from the first `{` to the last `}` inclusive.
fn parse_outer_braces(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&raw[start..=end])
}

/// Earliest-opening balanced `{...}` span that parses as an object.
///
/// Catches answers followed by commentary that itself contains braces, where
/// the outer-brace span is not valid JSON.
fn parse_first_balanced(raw: &str) -> Option<Map<String, Value>> {
    let mut spans = balanced_spans(raw);
    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
        .into_iter()
        .find_map(|(start, end)| parse_object(&raw[start..end]))
}

/// Every balanced brace span as `(start, end)` byte offsets, in closing order.
///
/// A single pass with a stack of open positions. Braces inside JSON strings
/// are skipped; quotes outside any brace are prose and ignored.
fn balanced_spans(s: &str) -> Vec<(usize, usize)> {
    let mut open: Vec<usize> = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in s.char_indices() {
        if open.is_empty() {
            if c == '{' {
                open.push(i);
            }
            continue;
        }
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => open.push(i),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn xy(x: i64, y: i64) -> Map<String, Value> {
        match json!({"x": x, "y": y}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn serialized_object_round_trips() {
        let value = json!({
            "name": "Porsche 911",
            "xValue": 90.5,
            "yValue": 95,
            "highlights": ["Flat-six", "Rear engine"],
            "attributes": {"Power": "283 kW"},
            "sources": []
        });
        let raw = serde_json::to_string(&value).unwrap();
        let parsed = extract_structured(&raw).unwrap();
        assert_eq!(Value::Object(parsed), value);
    }

    #[test]
    fn fenced_block_with_preamble() {
        let raw = "Sure! ```json\n{\"x\":1,\"y\":2}\n```";
        assert_eq!(extract_structured(raw).unwrap(), xy(1, 2));
    }

    #[test]
    fn untagged_fence() {
        let raw = "Here you go:\n```\n{\"x\": 3, \"y\": 4}\n```\nHope that helps.";
        assert_eq!(extract_structured(raw).unwrap(), xy(3, 4));
    }

    #[test]
    fn embedded_in_noise() {
        let raw = "noise {\"x\":1,\"y\":2} more noise";
        assert_eq!(extract_structured(raw).unwrap(), xy(1, 2));
    }

    #[test]
    fn trailing_commentary_with_braces() {
        let raw = r#"{"x": 5, "y": 6} (note: values use {0..100} scale)"#;
        assert_eq!(extract_structured(raw).unwrap(), xy(5, 6));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_balancing() {
        let raw = r#"Result: {"x": 7, "y": 8, "reasoning": "a {b} c"} trailing }"#;
        let parsed = extract_structured(raw).unwrap();
        assert_eq!(parsed["reasoning"], "a {b} c");
    }

    #[test]
    fn not_json_fails_with_excerpt() {
        let err = extract_structured("not json at all").unwrap_err();
        assert_eq!(err.excerpt, "not json at all");
    }

    #[test]
    fn excerpt_is_truncated_on_char_boundary() {
        let raw = "é".repeat(250);
        let err = extract_structured(&raw).unwrap_err();
        assert_eq!(err.excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn non_object_json_is_not_accepted() {
        assert!(extract_structured("[1, 2, 3]").is_err());
        assert!(extract_structured("42").is_err());
        assert!(extract_structured("[{\"x\": 1}, 2]").is_ok());
    }

    #[test]
    fn unclosed_preamble_brace_still_finds_inner_object() {
        let raw = r#"{ draft: {"x": 1, "y": 2}"#;
        assert_eq!(extract_structured(raw).unwrap(), xy(1, 2));
    }

    #[test]
    fn brace_flood_fails_in_linear_time() {
        let n = 200_000;
        let floods = [
            "{".repeat(n),
            format!("{}x{}", "{".repeat(n / 4), "}".repeat(n / 4)),
            "{a}".repeat(n / 3),
        ];
        for raw in &floods {
            let started = Instant::now();
            assert!(extract_structured(raw).is_err());
            assert!(
                started.elapsed() < Duration::from_secs(5),
                "took {:?} on {} bytes",
                started.elapsed(),
                raw.len()
            );
        }
    }

    #[test]
    fn reversed_braces_fail_cleanly() {
        assert!(extract_structured("} nothing here {").is_err());
    }
}
