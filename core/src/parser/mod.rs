//! Line-oriented APL parser
//!
//! The parser walks the source one physical line at a time and hands each
//! line to an ordered list of matchers (see [`matchers::MATCHERS`]). The first
//! matcher that consumes the line wins. Parsing never fails: anything that
//! does not fit a known form degrades into a raw step and leaves a
//! [`RecoveryNote`] behind.

mod directive;
mod matchers;
mod step;


use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::ast::{AgentDecl, Program, Task, MAIN_TASK, UNNAMED_PROGRAM};

pub use directive::{deep_merge, parse_directive, Directive, DIRECTIVE_NAMESPACE};

/* ===================== Recovery Notes ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryKind {
    /// A step matched no action form and will echo its text
    RawStep,
    /// A line outside any method went to the `main` task
    StrayLine,
    /// A second `program` header
    IgnoredProgramHeader,
    /// A method reused an existing qualified task name
    DuplicateTask,
    /// Directive metadata with no following method landed on the program
    ProgramMetadata,
    /// Directive words that fit no slot
    DirectiveWords,
    /// `precondition:` or `postcondition:` with nothing after it
    EmptyCondition,
}

/// Non-fatal diagnostic recorded wherever input degraded to a fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryNote {
    /// 1-based source line
    pub line: usize,
    pub kind: RecoveryKind,
    pub message: String,
}

impl fmt::Display for RecoveryNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {:?}: {}", self.line, self.kind, self.message)
    }
}

/* ===================== Public API ===================== */

/// Parse APL source into a [`Program`]
pub fn parse(text: &str) -> Program {
    parse_with_notes(text).0
}

/// Parse APL source, also returning every recovery that happened on the way
#[tracing::instrument(level = "debug", skip_all, fields(bytes = text.len()))]
pub fn parse_with_notes(text: &str) -> (Program, Vec<RecoveryNote>) {
    let mut state = ParserState::new();
    let mut last_line = 0;

    for (index, source) in text.lines().enumerate() {
        last_line = index + 1;
        let line = Line {
            number: index + 1,
            text: source.trim(),
        };
        for (name, matcher) in matchers::MATCHERS {
            if matcher(&mut state, &line) == LineMatch::Consumed {
                tracing::trace!(line = line.number, matcher = *name, "line consumed");
                break;
            }
        }
    }

    let (program, notes) = state.finish(last_line);
    for note in &notes {
        tracing::debug!(line = note.line, kind = ?note.kind, "{}", note.message);
    }
    tracing::debug!(
        program = %program.name,
        tasks = program.tasks.len(),
        steps = program.step_count(),
        notes = notes.len(),
        "parsed program"
    );
    (program, notes)
}

/* ===================== Parser State ===================== */

/// One trimmed source line
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub number: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineMatch {
    Consumed,
    Pass,
}

pub(crate) struct ParserState {
    program: Program,
    header_seen: bool,
    current_agent: Option<String>,
    /// Index into `program.tasks`
    current_task: Option<usize>,
    /// Directive fragments waiting for the next method header
    pending_metadata: Map<String, JsonValue>,
    notes: Vec<RecoveryNote>,
}

impl ParserState {
    fn new() -> Self {
        Self {
            program: Program::new(UNNAMED_PROGRAM),
            header_seen: false,
            current_agent: None,
            current_task: None,
            pending_metadata: Map::new(),
            notes: Vec::new(),
        }
    }

    pub(crate) fn note(&mut self, line: usize, kind: RecoveryKind, message: impl Into<String>) {
        self.notes.push(RecoveryNote {
            line,
            kind,
            message: message.into(),
        });
    }

    pub(crate) fn current_task_mut(&mut self) -> Option<&mut Task> {
        let index = self.current_task?;
        self.program.tasks.get_mut(index)
    }

    pub(crate) fn set_header(&mut self, name: &str, meta: Map<String, JsonValue>) {
        self.program.name = name.to_string();
        for (key, value) in meta {
            self.program.meta.insert(key, value);
        }
        self.header_seen = true;
    }

    pub(crate) fn register_agent(&mut self, name: &str, decl: &AgentDecl) {
        let entry = serde_json::to_value(decl).unwrap_or(JsonValue::Null);
        let agents = self
            .program
            .meta
            .entry("agents")
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !agents.is_object() {
            *agents = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(map) = agents {
            map.insert(name.to_string(), entry);
        }
        self.current_agent = Some(name.to_string());
        self.current_task = None;
    }

    /// Append a method task and make it current; pending metadata moves onto it
    pub(crate) fn open_task(&mut self, line: usize, mut task: Task) {
        if self.program.task(&task.name).is_some() {
            let message = format!("task '{}' is declared more than once", task.name);
            self.note(line, RecoveryKind::DuplicateTask, message);
        }
        let pending = std::mem::take(&mut self.pending_metadata);
        deep_merge(&mut task.metadata, pending);
        self.program.tasks.push(task);
        self.current_task = Some(self.program.tasks.len() - 1);
    }

    pub(crate) fn close_block(&mut self) {
        self.current_agent = None;
        self.current_task = None;
    }

    /// The `main` task, created on first use
    pub(crate) fn main_task_mut(&mut self) -> &mut Task {
        let index = match self.program.tasks.iter().position(|t| t.name == MAIN_TASK) {
            Some(index) => index,
            None => {
                self.program.tasks.push(Task::new(MAIN_TASK, Vec::new()));
                self.program.tasks.len() - 1
            }
        };
        &mut self.program.tasks[index]
    }

    /// Directive metadata goes to the open task, otherwise waits for the next method
    pub(crate) fn add_metadata(&mut self, fragment: Map<String, JsonValue>) {
        match self.current_task_mut() {
            Some(task) => deep_merge(&mut task.metadata, fragment),
            None => deep_merge(&mut self.pending_metadata, fragment),
        }
    }

    fn finish(mut self, last_line: usize) -> (Program, Vec<RecoveryNote>) {
        if !self.pending_metadata.is_empty() {
            let pending = std::mem::take(&mut self.pending_metadata);
            let keys: Vec<String> = pending.keys().cloned().collect();
            deep_merge(&mut self.program.meta, pending);
            self.note(
                last_line,
                RecoveryKind::ProgramMetadata,
                format!("directive metadata [{}] attached to the program", keys.join(", ")),
            );
        }
        (self.program, self.notes)
    }

    pub(crate) fn header_seen(&self) -> bool {
        self.header_seen
    }

    pub(crate) fn current_agent(&self) -> Option<&str> {
        self.current_agent.as_deref()
    }

    pub(crate) fn has_open_task(&self) -> bool {
        self.current_task.is_some()
    }
}
