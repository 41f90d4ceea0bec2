//! Structured directive comments (`# n8n: ...`)
//!
//! A directive line turns into a JSON fragment namespaced under `n8n`:
//!
//! ```text
//! # n8n: errorWorkflow="wf-1"          -> {"n8n": {"errorWorkflow": "wf-1"}}
//! # n8n: trigger path="/x"             -> {"n8n": {"trigger": {"config": {"path": "/x"}}}}
//! # n8n: trigger webhook path="/x"     -> {"n8n": {"trigger": {"type": "webhook", "config": {"path": "/x"}}}}
//! ```

use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::sync::OnceLock;

/// The only directive namespace the parser understands
pub const DIRECTIVE_NAMESPACE: &str = "n8n";

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#\s*([A-Za-z0-9_]+)\s*:\s*(.*)$").expect("directive regex is valid")
    })
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"([A-Za-z0-9_.\-]+)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|(\S+))|(\S+)"#,
        )
        .expect("directive token regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Fragment to deep-merge into task or program metadata
    pub fragment: Map<String, JsonValue>,
    /// Bare words past `<section> <type>` that had nowhere to go
    pub ignored: Vec<String>,
}

/// Parse a comment line as a directive
///
/// Returns `None` for ordinary comments, including comments with an unknown
/// namespace.
pub fn parse_directive(line: &str) -> Option<Directive> {
    let caps = directive_re().captures(line.trim())?;
    if !caps[1].eq_ignore_ascii_case(DIRECTIVE_NAMESPACE) {
        return None;
    }
    let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let mut words = Vec::new();
    let mut config = Map::new();
    for token in token_re().captures_iter(body) {
        match (token.get(1), token.get(5)) {
            (Some(key), _) => {
                let value = token
                    .get(2)
                    .or_else(|| token.get(3))
                    .or_else(|| token.get(4))
                    .map(|m| unescape_quotes(m.as_str()))
                    .unwrap_or_default();
                config.insert(key.as_str().to_string(), JsonValue::String(value));
            }
            (None, Some(word)) => words.push(word.as_str().to_string()),
            (None, None) => {}
        }
    }

    let mut words = words.into_iter();
    let section = words.next();
    let kind = words.next();
    let ignored: Vec<String> = words.collect();

    let inner = match section {
        None => config,
        Some(section) => {
            let mut entry = Map::new();
            if let Some(kind) = kind {
                entry.insert("type".to_string(), JsonValue::String(kind));
            }
            entry.insert("config".to_string(), JsonValue::Object(config));
            let mut sections = Map::new();
            sections.insert(section, JsonValue::Object(entry));
            sections
        }
    };

    let mut fragment = Map::new();
    fragment.insert(DIRECTIVE_NAMESPACE.to_string(), JsonValue::Object(inner));
    Some(Directive { fragment, ignored })
}

fn unescape_quotes(value: &str) -> String {
    value
        .replace("\\\"", "\"")
        .replace("\\'", "'")
        .replace("\\\\", "\\")
}

/// Merge `source` into `target`: objects merge recursively, anything else overwrites
pub fn deep_merge(target: &mut Map<String, JsonValue>, source: Map<String, JsonValue>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(JsonValue::Object(existing)), JsonValue::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}
