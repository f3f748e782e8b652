//! Typed readers for untrusted JSON records.
//!
//! Collaborators name the same thing several ways, so most readers take a
//! list of candidate keys and return the first usable value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// First non-empty trimmed string among `keys`
pub(crate) fn first_text(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Non-empty strings from an array, or a single string as a one-item list
pub(crate) fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items: Vec<String> = match value? {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    (!items.is_empty()).then_some(items)
}

/// [`string_list`] over candidate keys, empty when none match
pub(crate) fn first_string_list(raw: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|k| string_list(raw.get(*k)))
        .unwrap_or_default()
}

/// Equipment given as a string or a list, lists joined with ", "
pub(crate) fn equipment_text(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| string_list(raw.get(*k)))
        .map(|items| items.join(", "))
}

/// A count of at least one, from a number or numeric text
pub(crate) fn positive_count(value: &Value) -> Option<u32> {
    let count = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (count >= 1.0).then(|| count.min(u32::MAX as f64) as u32)
}

/// A positive integer from a number or the first integer in text ("8-12 reps" is 8)
pub(crate) fn leading_integer(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64().map(|f| f.max(0.0).min(u32::MAX as f64) as u32)?,
        Value::String(s) => INTEGER.find(s)?.as_str().parse().ok()?,
        _ => return None,
    };
    (n > 0).then_some(n)
}
