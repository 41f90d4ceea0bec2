//! Line matchers, tried in order until one consumes the line

use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::directive::parse_directive;
use super::step::{parse_step, ParsedStep};
use super::{Line, LineMatch, ParserState, RecoveryKind};
use crate::ast::{AgentDecl, Task};

pub(crate) type Matcher = fn(&mut ParserState, &Line<'_>) -> LineMatch;

/// Priority order matters: directives are comments, headers beat steps
pub(crate) const MATCHERS: &[(&str, Matcher)] = &[
    ("directive", match_directive),
    ("blank", match_blank_or_comment),
    ("program", match_program_header),
    ("agent", match_agent_header),
    ("method", match_method_header),
    ("end", match_end),
    ("condition", match_condition),
    ("step", match_step),
    ("main", match_main_fallback),
];

/* ===================== Regexes ===================== */

fn program_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^program\s+([A-Za-z0-9_]+)(?:\s*\((.*?)\))?").expect("program regex is valid")
    })
}

fn meta_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z0-9_]+)\s*=\s*"(.*?)""#).expect("meta pair regex is valid"))
}

fn agent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^agent\s+([A-Za-z0-9_]+)(?:\s*\((.*?)\))?(?:\s+binds\s+(.*?))?(?:\s+requires\s+(.*?))?\s*:\s*$",
        )
        .expect("agent regex is valid")
    })
}

fn bind_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([A-Za-z0-9_.]+)\s+as\s+([A-Za-z0-9_]+)$").expect("bind regex is valid")
    })
}

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^def\s+([A-Za-z0-9_]+)\s*\((.*?)\)\s*:\s*$").expect("def regex is valid")
    })
}

/* ===================== Matchers ===================== */

fn match_directive(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    if !line.text.starts_with('#') {
        return LineMatch::Pass;
    }
    let directive = match parse_directive(line.text) {
        Some(directive) => directive,
        None => return LineMatch::Pass,
    };
    if !directive.ignored.is_empty() {
        state.note(
            line.number,
            RecoveryKind::DirectiveWords,
            format!("ignored directive words: {}", directive.ignored.join(" ")),
        );
    }
    state.add_metadata(directive.fragment);
    LineMatch::Consumed
}

fn match_blank_or_comment(_state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    if line.text.is_empty() || line.text.starts_with('#') {
        LineMatch::Consumed
    } else {
        LineMatch::Pass
    }
}

fn match_program_header(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    let caps = match program_re().captures(line.text) {
        Some(caps) => caps,
        None => return LineMatch::Pass,
    };
    if state.header_seen() {
        state.note(
            line.number,
            RecoveryKind::IgnoredProgramHeader,
            format!("program header ignored, name already set: {}", line.text),
        );
        return LineMatch::Consumed;
    }

    let mut meta = Map::new();
    if let Some(raw) = caps.get(2) {
        for pair in meta_pair_re().captures_iter(raw.as_str()) {
            meta.insert(pair[1].to_string(), JsonValue::String(pair[2].to_string()));
        }
    }
    state.set_header(&caps[1], meta);
    LineMatch::Consumed
}

fn match_agent_header(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    let caps = match agent_re().captures(line.text) {
        Some(caps) => caps,
        None => return LineMatch::Pass,
    };
    let decl = AgentDecl {
        args: split_list(caps.get(2).map(|m| m.as_str()).unwrap_or("")),
        capabilities: parse_capabilities(caps.get(4).map(|m| m.as_str()).unwrap_or("")),
        binds: parse_binds(caps.get(3).map(|m| m.as_str()).unwrap_or("")),
    };
    state.register_agent(&caps[1], &decl);
    LineMatch::Consumed
}

fn match_method_header(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    let agent = match state.current_agent() {
        Some(agent) => agent.to_string(),
        None => return LineMatch::Pass,
    };
    let caps = match def_re().captures(line.text) {
        Some(caps) => caps,
        None => return LineMatch::Pass,
    };
    let name = format!("{}.{}", agent, &caps[1]);
    let args = split_list(caps.get(2).map(|m| m.as_str()).unwrap_or(""));
    state.open_task(line.number, Task::new(name, args));
    LineMatch::Consumed
}

fn match_end(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    if line.text.eq_ignore_ascii_case("end") {
        state.close_block();
        LineMatch::Consumed
    } else {
        LineMatch::Pass
    }
}

fn match_condition(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    if !state.has_open_task() {
        return LineMatch::Pass;
    }
    let (is_pre, rest) = match condition_body(line.text, "precondition:") {
        Some(rest) => (true, rest),
        None => match condition_body(line.text, "postcondition:") {
            Some(rest) => (false, rest),
            None => return LineMatch::Pass,
        },
    };
    if rest.is_empty() {
        state.note(
            line.number,
            RecoveryKind::EmptyCondition,
            format!("condition without an expression ignored: {}", line.text),
        );
        return LineMatch::Consumed;
    }
    if let Some(task) = state.current_task_mut() {
        let expr = Some(rest.to_string());
        if is_pre {
            task.precondition = expr;
        } else {
            task.postcondition = expr;
        }
    }
    LineMatch::Consumed
}

fn match_step(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    if !state.has_open_task() {
        return LineMatch::Pass;
    }
    let ParsedStep { step, fallback } = parse_step(line.text);
    if fallback {
        state.note(
            line.number,
            RecoveryKind::RawStep,
            format!("no action recognised, step echoes its text: {}", line.text),
        );
    }
    if let Some(task) = state.current_task_mut() {
        task.steps.push(step);
    }
    LineMatch::Consumed
}

fn match_main_fallback(state: &mut ParserState, line: &Line<'_>) -> LineMatch {
    let ParsedStep { step, fallback } = parse_step(line.text);
    state.note(
        line.number,
        RecoveryKind::StrayLine,
        format!("line outside any method added to 'main': {}", line.text),
    );
    if fallback {
        state.note(
            line.number,
            RecoveryKind::RawStep,
            format!("no action recognised, step echoes its text: {}", line.text),
        );
    }
    state.main_task_mut().steps.push(step);
    LineMatch::Consumed
}

/* ===================== Helpers ===================== */

/// Text after a case-insensitive `prefix`, trimmed
fn condition_body<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(text[prefix.len()..].trim())
    } else {
        None
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `mcp.newsapi as news, mcp.storage` -> `{news: mcp.newsapi, storage: mcp.storage}`
fn parse_binds(text: &str) -> BTreeMap<String, String> {
    let mut binds = BTreeMap::new();
    for part in split_list(text) {
        match bind_re().captures(&part) {
            Some(caps) => {
                binds.insert(caps[2].to_string(), caps[1].to_string());
            }
            None => {
                let alias = part.rsplit('.').next().unwrap_or(&part).to_string();
                binds.insert(alias, part);
            }
        }
    }
    binds
}

/// `capability.storage, capability.network` -> `[storage, network]`
fn parse_capabilities(text: &str) -> Vec<String> {
    let mut capabilities: Vec<String> = Vec::new();
    for part in split_list(text) {
        let name = match part.get(..11) {
            Some(head) if head.eq_ignore_ascii_case("capability.") => &part[11..],
            _ => part.as_str(),
        };
        let name = name.trim().to_ascii_lowercase();
        if !name.is_empty() && !capabilities.contains(&name) {
            capabilities.push(name);
        }
    }
    capabilities
}
