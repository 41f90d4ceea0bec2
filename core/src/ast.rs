//! Program representation produced by the parser
//!
//! A `Program` is a flat list of tasks. Agents do not own their tasks in the
//! tree; an agent only exists as an entry of `meta["agents"]` and as the
//! prefix of its tasks' qualified names (`"<agent>.<method>"`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// Name given to programs without a `program` header
pub const UNNAMED_PROGRAM: &str = "__unnamed__";

/// Name of the synthetic task collecting top-level lines
pub const MAIN_TASK: &str = "main";

/* ===================== Program ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    /// Header metadata plus the `agents` registry
    #[serde(default)]
    pub meta: Map<String, JsonValue>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: Map::new(),
            tasks: Vec::new(),
        }
    }

    /// Typed view of `meta["agents"][name]`
    ///
    /// Missing fields default to empty; a malformed entry is treated as absent.
    pub fn agent(&self, name: &str) -> Option<AgentDecl> {
        let entry = self.meta.get("agents")?.get(name)?;
        serde_json::from_value(entry.clone()).ok()
    }

    /// Find the first task with the given qualified name
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn step_count(&self) -> usize {
        self.tasks.iter().map(|t| t.steps.len()).sum()
    }
}

/* ===================== Agents ===================== */

/// Agent declaration as registered in `meta["agents"]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDecl {
    #[serde(default)]
    pub args: Vec<String>,
    /// Lower-cased capability names granted to every method of the agent
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// alias -> resource path
    #[serde(default)]
    pub binds: BTreeMap<String, String>,
}

impl AgentDecl {
    pub fn declares(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }
}

/* ===================== Tasks ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// `"<agent>.<method>"`, or `"main"` for top-level lines
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcondition: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Deep-merged directive fragments (`# n8n: ...`)
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

impl Task {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            precondition: None,
            postcondition: None,
            steps: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Prefix of the qualified name before the first `.`, `None` for `main`
    pub fn agent_name(&self) -> Option<&str> {
        self.name.split_once('.').map(|(agent, _)| agent)
    }

    /// Portion of the qualified name after the last `.`
    pub fn method_name(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, method)) => method,
            None => &self.name,
        }
    }
}

/* ===================== Steps ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Source line, kept for the raw-echo fallback and for auditing
    pub raw: String,
    #[serde(default)]
    pub assignment: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    /// Argument text, evaluated lazily by the runtime
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Step {
    /// A step with no action that echoes its own source when executed
    pub fn raw(text: impl Into<String>) -> Self {
        let raw = text.into();
        Self {
            args: Some(raw.clone()),
            raw,
            assignment: None,
            action: None,
            requires: Vec::new(),
        }
    }

    /// Identifier used for the IR `kind` field
    pub fn kind(&self) -> &str {
        self.action
            .as_ref()
            .map(Action::as_str)
            .unwrap_or(Action::CALL_LLM)
    }
}

/* ===================== Actions ===================== */

/// Action descriptor resolved once at parse time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Action {
    Fetch,
    CallLlm,
    Store,
    Assert,
    /// Any other identifier, dotted (`crm.get_account`) or not
    Tool(String),
}

impl Action {
    pub const FETCH: &'static str = "fetch";
    pub const CALL_LLM: &'static str = "call_llm";
    pub const STORE: &'static str = "store";
    pub const ASSERT: &'static str = "assert";

    /// Resolve an identifier; built-in names match case-insensitively
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier.to_ascii_lowercase().as_str() {
            Self::FETCH => Action::Fetch,
            Self::CALL_LLM => Action::CallLlm,
            Self::STORE => Action::Store,
            Self::ASSERT => Action::Assert,
            _ => Action::Tool(identifier.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Fetch => Self::FETCH,
            Action::CallLlm => Self::CALL_LLM,
            Action::Store => Self::STORE,
            Action::Assert => Self::ASSERT,
            Action::Tool(name) => name,
        }
    }

    /// `(prefix, rest)` for dotted tool identifiers
    pub fn dotted(&self) -> Option<(&str, &str)> {
        match self {
            Action::Tool(name) => name.split_once('.'),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl From<String> for Action {
    fn from(identifier: String) -> Self {
        Action::from_identifier(&identifier)
    }
}
