//! Per-run variable environment

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::ast::Program;
use crate::eval::Vars;

/// Variable snapshot per task name, in task-name order
pub type ExecutionResult = BTreeMap<String, Vars>;

/// Mutable state of one run
///
/// Variables are shared by every task of the program and never reset between
/// tasks, so a later task sees what earlier ones assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    pub vars: Vars,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing bindings, e.g. task inputs supplied by a caller
    pub fn with_vars(vars: Vars) -> Self {
        Self { vars }
    }

    /// Bind every task parameter not already bound to `null`
    pub fn seed_task_params(&mut self, program: &Program) {
        for task in &program.tasks {
            for arg in &task.args {
                self.vars.entry(arg.clone()).or_insert(JsonValue::Null);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: JsonValue) {
        self.vars.insert(name.into(), value);
    }

    pub(crate) fn snapshot(&self) -> Vars {
        self.vars.clone()
    }
}
