//! Validation and normalization of an extracted oracle object.
//!
//! Coordinates are the only field without a safe default. Everything else
//! is backfilled, so a well-formed but sparse answer still produces a usable
//! [`StructuredResult`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::coords::clamp;
use crate::prompts::IntentKind;

/// Most highlights an item keeps.
pub const MAX_HIGHLIGHTS: usize = 10;

const FAVICON_ENDPOINT: &str = "https://www.google.com/s2/favicons";

// Requested wire names first, then names older prompt revisions used.
const X_KEYS: &[&str] = &["xValue", "x"];
const Y_KEYS: &[&str] = &["yValue", "y"];
const HIGHLIGHT_KEYS: &[&str] = &["highlights", "usps"];
const ATTRIBUTE_KEYS: &[&str] = &["attributes", "specifications"];

/// The oracle's answer after extraction and sanitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("oracle response has no numeric coordinates (missing or non-numeric {field})")]
    MissingCoordinates { field: &'static str },
    #[error("suggestion has no name")]
    MissingName,
}

/// Favicon URL for a domain. A pure template; the URL may still 404.
pub fn icon_url(domain: &str) -> String {
    format!("{FAVICON_ENDPOINT}?domain={domain}&sz=128")
}

/// Validate, clamp and backfill an extracted object.
pub fn sanitize(
    object: &Map<String, Value>,
    kind: IntentKind,
) -> Result<StructuredResult, SanitizeError> {
    let x = coordinate(object, X_KEYS, "x")?;
    let y = coordinate(object, Y_KEYS, "y")?;

    let name = non_empty_string(object.get("name"));
    if kind == IntentKind::SuggestCompetitor && name.is_none() {
        return Err(SanitizeError::MissingName);
    }

    let domain = non_empty_string(object.get("domain"));
    let icon_url = domain.as_deref().map(icon_url);

    let mut highlights = first_present(object, HIGHLIGHT_KEYS)
        .map(string_list)
        .unwrap_or_default();
    highlights.truncate(MAX_HIGHLIGHTS);

    Ok(StructuredResult {
        name,
        x: clamp(x),
        y: clamp(y),
        domain,
        icon_url,
        reasoning: non_empty_string(object.get("reasoning")),
        highlights,
        attributes: first_present(object, ATTRIBUTE_KEYS)
            .map(string_map)
            .unwrap_or_default(),
        sources: object.get("sources").map(string_list).unwrap_or_default(),
    })
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(*k))
}

fn coordinate(
    object: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<f64, SanitizeError> {
    keys.iter()
        .find_map(|k| object.get(*k).and_then(Value::as_f64))
        .ok_or(SanitizeError::MissingCoordinates { field })
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Scalars rendered as text; nulls, arrays and objects have no sensible text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        _ => Vec::new(),
    }
}

fn string_map(value: &Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(k, v)| scalar_text(v).map(|text| (k.clone(), text)))
            .collect(),
        _ => BTreeMap::new(),
    }
}
