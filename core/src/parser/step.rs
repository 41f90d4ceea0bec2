//! Parsing of a single step line

use regex::Regex;
use std::sync::OnceLock;

use crate::ast::{Action, Step};

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `==` on the right of the name is a comparison, not an assignment
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_]+)\s*=([^=].*)$").expect("assignment regex is valid")
    })
}

fn requires_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*requires\s+capability\.([A-Za-z0-9_]+)").expect("requires regex is valid")
    })
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_.]+)\s*\((.*)\)\s*$").expect("call regex is valid")
    })
}

fn string_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^"((?:[^"\\]|\\.)*)"$|^'((?:[^'\\]|\\.)*)'$"#)
            .expect("string literal regex is valid")
    })
}

/// A parsed step and whether it degraded to the raw fallback
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedStep {
    pub step: Step,
    pub fallback: bool,
}

pub(crate) fn parse_step(line: &str) -> ParsedStep {
    let raw = line.trim();
    let body = strip_step_keyword(raw);

    let (assignment, rest) = match assignment_re().captures(body) {
        Some(caps) => (Some(caps[1].to_string()), caps[2].trim().to_string()),
        None => (None, body.to_string()),
    };

    let (rest, requires) = extract_requires(&rest);

    let mut step = Step {
        raw: raw.to_string(),
        assignment,
        action: None,
        args: None,
        requires,
    };

    if let Some(caps) = call_re().captures(&rest) {
        step.action = Some(Action::from_identifier(&caps[1]));
        step.args = Some(caps[2].to_string());
        return ParsedStep {
            step,
            fallback: false,
        };
    }

    if step.assignment.is_none() {
        if let Some(text) = string_literal(&rest) {
            step.action = Some(Action::CallLlm);
            step.args = Some(format!("prompt=\"{}\"", escape_prompt(&text)));
            return ParsedStep {
                step,
                fallback: false,
            };
        }
    }

    step.args = Some(rest);
    ParsedStep {
        step,
        fallback: true,
    }
}

/// Drop a leading `step` keyword unless `step` is the assignment target
fn strip_step_keyword(text: &str) -> &str {
    let lower = text.get(..4).map(|p| p.eq_ignore_ascii_case("step")).unwrap_or(false);
    if !lower {
        return text;
    }
    let rest = &text[4..];
    if !rest.starts_with(char::is_whitespace) {
        return text;
    }
    let rest = rest.trim_start();
    if rest.starts_with('=') && !rest.starts_with("==") {
        return text;
    }
    rest
}

/// Remove every `requires capability.<id>` clause; ids come back lower-cased and deduplicated
fn extract_requires(text: &str) -> (String, Vec<String>) {
    let mut requires: Vec<String> = Vec::new();
    for caps in requires_re().captures_iter(text) {
        let capability = caps[1].to_ascii_lowercase();
        if !requires.contains(&capability) {
            requires.push(capability);
        }
    }
    if requires.is_empty() {
        return (text.to_string(), requires);
    }
    let stripped = requires_re().replace_all(text, "").trim().to_string();
    (stripped, requires)
}

/// Contents of a lone string literal, escapes resolved
fn string_literal(text: &str) -> Option<String> {
    let caps = string_literal_re().captures(text)?;
    let body = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }
    Some(out)
}

fn escape_prompt(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
