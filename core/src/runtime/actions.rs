//! Step dispatch, one handler per action

use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::sync::OnceLock;

use super::capabilities::is_granted;
use super::{expression_error, ExecutionContext, Runtime, TaskScope};
use crate::adapters::STORAGE_CAPABILITY;
use crate::ast::{Action, Step};
use crate::errors::{Error, Result};
use crate::eval::{self, Vars};

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["'](.*?)["']"#).expect("quoted regex is valid"))
}

fn prompt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|,)\s*prompt\s*=\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')"#)
            .expect("prompt regex is valid")
    })
}

fn model_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|,)\s*model\s*=\s*["']([^"']*)["']"#).expect("model regex is valid")
    })
}

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("template regex is valid"))
}

impl Runtime {
    pub(super) fn dispatch(
        &self,
        step: &Step,
        scope: &TaskScope<'_>,
        ctx: &ExecutionContext,
    ) -> Result<JsonValue> {
        let args = step.args.as_deref().unwrap_or("");
        match &step.action {
            Some(Action::Fetch) => Ok(fetch(args)),
            Some(Action::CallLlm) => self.call_llm(step, scope, args, &ctx.vars),
            Some(Action::Store) => self.store(step, scope, args, &ctx.vars),
            Some(Action::Assert) => self.assert(step, scope, args, &ctx.vars),
            Some(Action::Tool(name)) => self.tool(step, scope, name, args),
            None => Ok(JsonValue::String(step.raw.clone())),
        }
    }

    fn call_llm(
        &self,
        step: &Step,
        scope: &TaskScope<'_>,
        args: &str,
        vars: &Vars,
    ) -> Result<JsonValue> {
        let (prompt, rest) = split_prompt(args);
        let prompt = render_template(&prompt, vars);
        let model = model_re()
            .captures(&rest)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| self.config.default_model.clone());

        tracing::debug!(task = %scope.task.name, model = %model, "calling text generator");
        let text = self
            .llm
            .generate(&prompt, Some(&model))
            .map_err(|source| Error::Adapter {
                task: scope.task.name.clone(),
                step: step.raw.clone(),
                source,
            })?;
        Ok(JsonValue::String(text))
    }

    fn store(
        &self,
        step: &Step,
        scope: &TaskScope<'_>,
        args: &str,
        vars: &Vars,
    ) -> Result<JsonValue> {
        let task = scope.task;
        if !is_granted(&self.config, scope.agent, STORAGE_CAPABILITY) {
            return Err(Error::StorageDisabled {
                task: task.name.clone(),
                step: step.raw.clone(),
                reason: "storage capability not enabled for runtime".to_string(),
            });
        }

        let call_args = eval::evaluate_call_args(args, vars, &*self.env)
            .map_err(|source| expression_error(task, Some(step.raw.as_str()), source))?;
        let kwargs = call_args.named(&["key", "content"]);
        let key = kwargs
            .get("key")
            .or_else(|| kwargs.get("path"))
            .map(eval::display)
            .unwrap_or_else(|| "item".to_string());

        tracing::info!(
            task = %task.name,
            agent = ?scope.action_ctx.agent,
            key = %key,
            "storage requested"
        );

        match &self.storage {
            Some(adapter) => {
                let provides = adapter
                    .capabilities()
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(STORAGE_CAPABILITY));
                if !provides {
                    return Err(Error::StorageDisabled {
                        task: task.name.clone(),
                        step: step.raw.clone(),
                        reason: "storage adapter does not provide the storage capability"
                            .to_string(),
                    });
                }
                adapter
                    .perform("store", &kwargs, &scope.action_ctx)
                    .map_err(|source| Error::Adapter {
                        task: task.name.clone(),
                        step: step.raw.clone(),
                        source,
                    })
            }
            None => {
                let size = kwargs
                    .get("content")
                    .or_else(|| kwargs.get("value"))
                    .map(|v| eval::display(v).len())
                    .unwrap_or(0);
                Ok(json!({
                    "status": "ok",
                    "key": key,
                    "meta": {
                        "mock": true,
                        "requesting_task": task.name,
                        "agent": scope.action_ctx.agent,
                        "key": key,
                        "size": size,
                    }
                }))
            }
        }
    }

    fn assert(
        &self,
        step: &Step,
        scope: &TaskScope<'_>,
        args: &str,
        vars: &Vars,
    ) -> Result<JsonValue> {
        let holds = eval::evaluate_condition(args, vars)
            .map_err(|source| expression_error(scope.task, Some(step.raw.as_str()), source))?;
        if !holds {
            return Err(Error::AssertionFailed {
                task: scope.task.name.clone(),
                expr: args.to_string(),
            });
        }
        Ok(JsonValue::Bool(true))
    }

    fn tool(&self, step: &Step, scope: &TaskScope<'_>, name: &str, args: &str) -> Result<JsonValue> {
        let (prefix, _) = match name.split_once('.') {
            Some(parts) => parts,
            None => return Ok(JsonValue::String(step.raw.clone())),
        };

        if self.config.blocks(prefix) {
            return Err(Error::UnsupportedAction {
                task: scope.task.name.clone(),
                action: name.to_string(),
                reason: format!(
                    "'{}' integration is not bundled with the runtime; bind the agent to an external tool server instead",
                    prefix
                ),
            });
        }

        let mut echo = json!({ "tool": name, "args": args });
        if let Some(path) = scope.agent.and_then(|agent| agent.binds.get(prefix)) {
            echo["bind"] = JsonValue::String(path.clone());
        }
        tracing::debug!(task = %scope.task.name, tool = %name, "tool call echoed");
        Ok(echo)
    }
}

/// `"fetched(<first quoted literal>)"`, or the raw arguments when nothing is quoted
fn fetch(args: &str) -> JsonValue {
    let target = quoted_re()
        .captures(args)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(args);
    JsonValue::String(format!("fetched({})", target))
}

/// Prompt text plus the remaining arguments with the prompt removed
///
/// Without a `prompt=` argument the whole argument text is the prompt.
fn split_prompt(args: &str) -> (String, String) {
    match prompt_re().captures(args) {
        Some(caps) => {
            let prompt = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| unescape(m.as_str()))
                .unwrap_or_default();
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let rest = format!("{}{}", &args[..whole.start], &args[whole.end..]);
            (prompt, rest)
        }
        None => (args.to_string(), String::new()),
    }
}

/// Replace `{{name}}` with the variable's text; unknown names become empty
fn render_template(template: &str, vars: &Vars) -> String {
    template_re()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1]).map(eval::display).unwrap_or_default()
        })
        .into_owned()
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
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
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn test_fetch_uses_first_quoted_literal() {
        assert_eq!(fetch("\"http://a\", 'b'"), json!("fetched(http://a)"));
        assert_eq!(fetch("url"), json!("fetched(url)"));
        assert_eq!(fetch(""), json!("fetched()"));
    }

    #[test]
    fn test_render_template() {
        let vars = btreemap! {
            "name".to_string() => json!("Ada"),
            "n".to_string() => json!(3),
        };
        assert_eq!(
            render_template("Hi {{name}}, {{ n }} new, {{missing}}!", &vars),
            "Hi Ada, 3 new, !"
        );
    }

    #[test]
    fn test_prompt_extraction_unescapes() {
        let caps = prompt_re().captures(r#"prompt="say \"hi\"", model="m""#).unwrap();
        assert_eq!(unescape(&caps[1]), "say \"hi\"");
        assert_eq!(&model_re().captures(r#"prompt="x", model="m""#).unwrap()[1], "m");
    }

    #[test]
    fn test_prompt_and_model_start_at_argument_boundary() {
        let (prompt, rest) = split_prompt(r#"prompt="use model='x'""#);
        assert_eq!(prompt, "use model='x'");
        assert!(model_re().captures(&rest).is_none());

        let (prompt, _) = split_prompt(r#"system_prompt="be brief", prompt="hi""#);
        assert_eq!(prompt, "hi");

        let (prompt, rest) = split_prompt(r#"prompt="a, model='x'", model="m""#);
        assert_eq!(prompt, "a, model='x'");
        assert_eq!(&model_re().captures(&rest).unwrap()[1], "m");

        assert!(prompt_re().captures(r#"system_prompt="only""#).is_none());
    }
}
