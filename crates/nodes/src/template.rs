//! `{{path}}` placeholder resolution against a run's variable namespace.
//!
//! A path is dot-separated. The first segment selects the namespace
//! (`trigger`, `env` or a node key), the remaining segments walk into nested
//! objects; numeric segments index arrays:
//!
//! ```text
//! "Write about {{ trigger.topic }} for {{ research.sources.0.title }}"
//! ```
//!
//! Unresolvable paths render as an empty string and push a warning instead
//! of failing. Resolution only reads the namespace.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// The per-run namespace: `trigger`, `env` and one entry per executed node.
pub type Variables = Map<String, Value>;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\s*\}\}")
            .expect("template token pattern is valid")
    })
}

/// Look up a dot-separated path in the namespace.
pub fn lookup<'a>(path: &str, vars: &'a Variables) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = vars.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Render a template to a string. Every token is replaced by the stringified
/// value it references.
pub fn resolve_str(template: &str, vars: &Variables, warnings: &mut Vec<String>) -> String {
    if !template.contains("{{") {
        return template.to_owned();
    }

    token_pattern()
        .replace_all(template, |caps: &Captures<'_>| {
            let path = &caps[1];
            match lookup(path, vars) {
                Some(value) => stringify(value),
                None => {
                    warn_unresolved(path, warnings);
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Render a template to a value. A template made of exactly one token yields
/// the referenced value unchanged (objects, arrays and numbers survive);
/// anything else is rendered as a string.
pub fn resolve(template: &str, vars: &Variables, warnings: &mut Vec<String>) -> Value {
    if let Some(caps) = token_pattern().captures(template) {
        let whole = caps.get(0).map(|m| m.as_str().len()) == Some(template.trim().len());
        if whole {
            let path = &caps[1];
            return match lookup(path, vars) {
                Some(value) => value.clone(),
                None => {
                    warn_unresolved(path, warnings);
                    Value::String(String::new())
                }
            };
        }
    }

    Value::String(resolve_str(template, vars, warnings))
}

/// Resolve every string leaf of a structured value. Non-string leaves pass
/// through unchanged.
pub fn resolve_value(value: &Value, vars: &Variables, warnings: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => resolve(s, vars, warnings),
        Value::Array(items) => Value::Array(
            items.iter().map(|v| resolve_value(v, vars, warnings)).collect(),
        ),
        Value::Object(map) => Value::Object(resolve_map(map, vars, warnings)),
        other => other.clone(),
    }
}

/// [`resolve_value`] for a map.
pub fn resolve_map(
    map: &Map<String, Value>,
    vars: &Variables,
    warnings: &mut Vec<String>,
) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, vars, warnings)))
        .collect()
}

/// Strings render raw, null renders empty, everything else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn warn_unresolved(path: &str, warnings: &mut Vec<String>) {
    let message = format!("unresolved template reference '{{{{{path}}}}}'");
    tracing::warn!("{message}");
    if !warnings.contains(&message) {
        warnings.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Variables {
        json!({
            "trigger": { "topic": "AI", "count": 3 },
            "env": { "BRAND": "Acme" },
            "research": {
                "x": 5,
                "sources": [{ "title": "first" }, { "title": "second" }],
                "empty": null
            }
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn string_without_tokens_is_returned_unchanged() {
        let mut warnings = Vec::new();
        for s in ["", "plain text", "{ not a token }", "{{ }}", "a {{ b"] {
            assert_eq!(resolve_str(s, &vars(), &mut warnings), s);
        }
        assert!(warnings.is_empty());
    }

    #[test]
    fn tokens_are_replaced_inside_larger_strings() {
        let mut warnings = Vec::new();
        let out = resolve_str(
            "Write about {{trigger.topic}} for {{ env.BRAND }}",
            &vars(),
            &mut warnings,
        );
        assert_eq!(out, "Write about AI for Acme");
        assert!(warnings.is_empty());
    }

    #[test]
    fn numbers_render_literally() {
        let mut warnings = Vec::new();
        assert_eq!(resolve_str("{{research.x}}", &vars(), &mut warnings), "5");
        assert_eq!(resolve_str("n={{trigger.count}}", &vars(), &mut warnings), "n=3");
    }

    #[test]
    fn numeric_segments_index_arrays() {
        let mut warnings = Vec::new();
        let out = resolve_str("{{research.sources.1.title}}", &vars(), &mut warnings);
        assert_eq!(out, "second");
    }

    #[test]
    fn unresolved_paths_render_empty_and_warn_once() {
        let mut warnings = Vec::new();
        let out = resolve_str("[{{missing.field}}][{{missing.field}}]", &vars(), &mut warnings);
        assert_eq!(out, "[][]");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing.field"));
    }

    #[test]
    fn null_renders_empty_without_warning() {
        let mut warnings = Vec::new();
        assert_eq!(resolve_str("{{research.empty}}", &vars(), &mut warnings), "");
        assert!(warnings.is_empty());
    }

    #[test]
    fn single_token_keeps_structure() {
        let mut warnings = Vec::new();
        let out = resolve("{{ research.sources }}", &vars(), &mut warnings);
        assert_eq!(out, json!([{ "title": "first" }, { "title": "second" }]));

        let out = resolve("{{research.x}}", &vars(), &mut warnings);
        assert_eq!(out, json!(5));
    }

    #[test]
    fn nested_values_resolve_recursively() {
        let mut warnings = Vec::new();
        let config = json!({
            "title": "About {{trigger.topic}}",
            "tags": ["{{env.BRAND}}", 7, true],
            "nested": { "score": "{{research.x}}" }
        });
        let out = resolve_value(&config, &vars(), &mut warnings);
        assert_eq!(
            out,
            json!({
                "title": "About AI",
                "tags": ["Acme", 7, true],
                "nested": { "score": 5 }
            })
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut warnings = Vec::new();
        let once = resolve_str("{{trigger.topic}} {{nope}}", &vars(), &mut warnings);
        let twice = resolve_str(&once, &vars(), &mut warnings);
        assert_eq!(once, twice);
    }
}
