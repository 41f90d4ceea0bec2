//! Sequential program interpreter
//!
//! Tasks run in declaration order over one shared [`ExecutionContext`]. Each
//! task checks its precondition, runs its steps (capability check, then action
//! dispatch, then assignment), checks its postcondition, and leaves a snapshot
//! of all variables in the [`ExecutionResult`]. The first error aborts the
//! run; there is no retry and no rollback.
//!
//! ```rust,ignore
//! let program = apl_core::parse(source);
//! let runtime = Runtime::builder().allow_storage(true).build();
//! let results = runtime.execute(&program)?;
//! ```

mod actions;
mod capabilities;
mod context;

#[cfg(test)]
mod tests;

use serde_json::Value as JsonValue;

use crate::adapters::{
    ActionContext, EnvResolver, MockLlm, ProcessEnv, StorageAdapter, TextGenerator,
};
use crate::ast::{AgentDecl, Program, Task};
use crate::config::RuntimeConfig;
use crate::errors::{Error, Result};
use crate::eval::{self, EvalError};

pub use context::{ExecutionContext, ExecutionResult};

/* ===================== Runtime ===================== */

pub struct Runtime {
    llm: Box<dyn TextGenerator>,
    storage: Option<Box<dyn StorageAdapter>>,
    env: Box<dyn EnvResolver>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Mock text generator, no storage adapter, process environment, default config
    pub fn new() -> Self {
        RuntimeBuilder::new().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run every task of `program` in a fresh context
    pub fn execute(&self, program: &Program) -> Result<ExecutionResult> {
        let mut ctx = ExecutionContext::new();
        self.execute_in(program, &mut ctx)
    }

    /// Run every task of `program` in a caller-owned context
    ///
    /// On error, variables assigned before the failing step stay in `ctx`.
    #[tracing::instrument(level = "debug", skip_all, fields(program = %program.name))]
    pub fn execute_in(
        &self,
        program: &Program,
        ctx: &mut ExecutionContext,
    ) -> Result<ExecutionResult> {
        tracing::info!(
            program = %program.name,
            tasks = program.tasks.len(),
            "program started"
        );

        let mut results = ExecutionResult::new();
        for task in &program.tasks {
            self.run_task(program, task, ctx)?;
            if results.insert(task.name.clone(), ctx.snapshot()).is_some() {
                tracing::warn!(task = %task.name, "duplicate task name, earlier result overwritten");
            }
        }

        tracing::info!(program = %program.name, results = results.len(), "program finished");
        Ok(results)
    }

    fn run_task(&self, program: &Program, task: &Task, ctx: &mut ExecutionContext) -> Result<()> {
        tracing::debug!(task = %task.name, steps = task.steps.len(), "task started");

        let agent_name = task.agent_name();
        let agent = agent_name.and_then(|name| program.agent(name));
        let scope = TaskScope {
            task,
            agent: agent.as_ref(),
            action_ctx: ActionContext {
                task: task.name.clone(),
                agent: agent_name.map(str::to_string),
                program_meta: program.meta.clone(),
            },
        };

        if let Some(expr) = &task.precondition {
            if !self.condition(task, expr, ctx)? {
                return Err(Error::PreconditionFailed {
                    task: task.name.clone(),
                    expr: expr.clone(),
                });
            }
        }

        let mut unassigned: Option<JsonValue> = None;
        for step in &task.steps {
            capabilities::check_step(&self.config, scope.agent, task, step)?;
            let value = self.dispatch(step, &scope, ctx)?;
            tracing::debug!(task = %task.name, action = step.kind(), "step completed");
            match &step.assignment {
                Some(name) => {
                    ctx.set(name.clone(), value);
                    unassigned = None;
                }
                None => unassigned = Some(value),
            }
        }
        if let Some(value) = unassigned {
            ctx.vars
                .entry(task.method_name().to_string())
                .or_insert(value);
        }

        if let Some(expr) = &task.postcondition {
            if !self.condition(task, expr, ctx)? {
                return Err(Error::PostconditionFailed {
                    task: task.name.clone(),
                    expr: expr.clone(),
                });
            }
        }
        Ok(())
    }

    fn condition(&self, task: &Task, expr: &str, ctx: &ExecutionContext) -> Result<bool> {
        eval::evaluate_condition(expr, &ctx.vars).map_err(|source| expression_error(task, None, source))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// What a step needs to know about the task it runs in
pub(crate) struct TaskScope<'a> {
    pub task: &'a Task,
    pub agent: Option<&'a AgentDecl>,
    pub action_ctx: ActionContext,
}

pub(crate) fn expression_error(task: &Task, step: Option<&str>, source: EvalError) -> Error {
    Error::Expression {
        task: task.name.clone(),
        step: step.map(str::to_string),
        source,
    }
}

/* ===================== Builder ===================== */

/// Builder for [`Runtime`]
///
/// Explicit overrides (`allow_storage`, `grant_capability`) apply on top of
/// whatever config was given, regardless of call order.
pub struct RuntimeBuilder {
    llm: Option<Box<dyn TextGenerator>>,
    storage: Option<Box<dyn StorageAdapter>>,
    env: Option<Box<dyn EnvResolver>>,
    config: RuntimeConfig,
    allow_storage: Option<bool>,
    extra_capabilities: Vec<String>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            storage: None,
            env: None,
            config: RuntimeConfig::default(),
            allow_storage: None,
            extra_capabilities: Vec::new(),
        }
    }

    pub fn llm(mut self, llm: impl TextGenerator + 'static) -> Self {
        self.llm = Some(Box::new(llm));
        self
    }

    pub fn storage_adapter(mut self, adapter: impl StorageAdapter + 'static) -> Self {
        self.storage = Some(Box::new(adapter));
        self
    }

    pub fn env_resolver(mut self, env: impl EnvResolver + 'static) -> Self {
        self.env = Some(Box::new(env));
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn allow_storage(mut self, allow: bool) -> Self {
        self.allow_storage = Some(allow);
        self
    }

    pub fn grant_capability(mut self, capability: impl Into<String>) -> Self {
        self.extra_capabilities.push(capability.into());
        self
    }

    pub fn build(self) -> Runtime {
        let mut config = self.config;
        if let Some(allow) = self.allow_storage {
            config.allow_storage = allow;
        }
        for capability in self.extra_capabilities {
            let capability = capability.trim().to_ascii_lowercase();
            if !capability.is_empty() && !config.capabilities.contains(&capability) {
                config.capabilities.push(capability);
            }
        }

        Runtime {
            llm: self
                .llm
                .unwrap_or_else(|| Box::new(MockLlm::with_default_model(config.default_model.clone()))),
            storage: self.storage,
            env: self.env.unwrap_or_else(|| Box::new(ProcessEnv)),
            config,
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
