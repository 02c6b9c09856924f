//! Layered parsing of model output into a [`Diagnosis`].
//!
//! The model is asked for a bare JSON object but does not always comply: it
//! may wrap the object in a fenced code block, surround it with prose, or put
//! the whole document inside the `summary` string. Extraction is an ordered
//! chain of strategies; the first one that yields a JSON object wins. Field
//! decoding is lenient and drops malformed list items one at a time.

use serde_json::{Map, Value};

use crate::models::{Abnormality, Diagnosis, Priority, Recommendation};

// ---

/// Outcome of interpreting one model response.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Parsed(Diagnosis),
    Fallback { reason: String },
}

impl Analysis {
    pub fn into_diagnosis(self) -> Diagnosis {
        match self {
            Analysis::Parsed(diagnosis) => diagnosis,
            Analysis::Fallback { .. } => Diagnosis::placeholder(),
        }
    }
}

struct Strategy {
    name: &'static str,
    extract: fn(&str) -> Option<Map<String, Value>>,
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "whole-document",
        extract: whole_document,
    },
    Strategy {
        name: "fenced-block",
        extract: fenced_block,
    },
    Strategy {
        name: "embedded-object",
        extract: embedded_object,
    },
];

const DIAGNOSIS_KEYS: [&str; 3] = ["summary", "abnormalities", "recommendations"];

/// Run the extraction chain over a raw model response.
pub fn parse_response(raw: &str) -> Analysis {
    // ---
    for strategy in STRATEGIES {
        if let Some(object) = (strategy.extract)(raw) {
            tracing::debug!(strategy = strategy.name, "Model response parsed");
            return Analysis::Parsed(normalize(object));
        }
    }

    Analysis::Fallback {
        reason: format!("no JSON object found in {} byte response", raw.len()),
    }
}

// ---

fn whole_document(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text.trim()).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<Map<String, Value>> {
    whole_document(strip_fences(text)?)
}

fn embedded_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    whole_document(&text[start..=end])
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and the closing fence.
///
/// Returns `None` when the text does not open with a fence.
pub fn strip_fences(text: &str) -> Option<&str> {
    // ---
    let body = text.trim().strip_prefix("```")?;
    let body = match body.find('\n') {
        Some(pos) if body[..pos].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &body[pos + 1..]
        }
        _ => body.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    let body = body.trim_end();
    Some(body.strip_suffix("```").unwrap_or(body).trim())
}

/// A `summary` that is itself a diagnosis document, as an object or a string.
fn nested_document(summary: &Value) -> Option<Map<String, Value>> {
    // ---
    let map = match summary {
        Value::Object(map) => map.clone(),
        Value::String(text) => whole_document(text).or_else(|| fenced_block(text))?,
        _ => return None,
    };
    DIAGNOSIS_KEYS
        .iter()
        .any(|key| map.contains_key(*key))
        .then_some(map)
}

fn normalize(mut outer: Map<String, Value>) -> Diagnosis {
    // ---
    // Each nested document is strictly smaller than its holder, so this ends.
    while let Some(mut nested) = outer.get("summary").and_then(nested_document) {
        for key in ["abnormalities", "recommendations"] {
            if let Some(value) = outer.remove(key) {
                nested.entry(key).or_insert(value);
            }
        }
        outer = nested;
    }

    Diagnosis {
        summary: summary_text(outer.get("summary")),
        abnormalities: items(outer.get("abnormalities"), abnormality),
        recommendations: items(outer.get("recommendations"), recommendation),
    }
}

fn summary_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

/// Decode a list field; a lone item is accepted as a one-element list.
fn items<T>(value: Option<&Value>, decode: fn(&Value) -> Option<T>) -> Vec<T> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.iter().filter_map(decode).collect(),
        Some(single) => decode(single).into_iter().collect(),
    }
}

/// First non-empty text value under any of `keys`.
fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn abnormality(value: &Value) -> Option<Abnormality> {
    // ---
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(Abnormality {
            issue: text.trim().to_string(),
            ..Abnormality::default()
        }),
        Value::Object(map) => {
            let record = Abnormality {
                component: text_field(map, &["component", "equipment", "device", "name"])
                    .unwrap_or_default(),
                issue: text_field(map, &["issue", "description", "problem", "message"])
                    .unwrap_or_default(),
                value: ["value", "observed", "observed_value", "observedValue", "reading"]
                    .iter()
                    .find_map(|key| map.get(*key).filter(|v| !v.is_null()).cloned())
                    .unwrap_or(Value::Null),
                normal_range: text_field(
                    map,
                    &["normal_range", "normalRange", "expected_range", "expectedRange"],
                ),
            };
            let empty =
                record.component.is_empty() && record.issue.is_empty() && record.value.is_null();
            (!empty).then_some(record)
        }
        _ => None,
    }
}

fn recommendation(value: &Value) -> Option<Recommendation> {
    // ---
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(Recommendation {
            action: text.trim().to_string(),
            priority: Priority::default(),
        }),
        Value::Object(map) => {
            let action = text_field(map, &["action", "recommendation", "description", "text"])?;
            let priority = text_field(map, &["priority", "urgency"])
                .map(|label| Priority::from_label(&label))
                .unwrap_or_default();
            Some(Recommendation { action, priority })
        }
        _ => None,
    }
}
