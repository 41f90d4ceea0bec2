//! Test doubles and shortcuts for runtime tests

use anyhow::{anyhow, Result};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::adapters::{ActionContext, StorageAdapter, TextGenerator};
use crate::parser::parse;
use crate::runtime::{ExecutionResult, Runtime};

/// Route runtime logs to the test writer, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Parse `source` and run it on a default runtime
pub fn run(source: &str) -> crate::errors::Result<ExecutionResult> {
    init_tracing();
    Runtime::new().execute(&parse(source))
}

/// Storage adapter that counts and records every call
#[derive(Clone, Default)]
pub struct CountingStorage {
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<(BTreeMap<String, JsonValue>, ActionContext)>>>,
    pub without_capability: bool,
}

impl CountingStorage {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StorageAdapter for CountingStorage {
    fn capabilities(&self) -> Vec<String> {
        if self.without_capability {
            vec!["blobs".to_string()]
        } else {
            vec!["storage".to_string()]
        }
    }

    fn perform(
        &self,
        action: &str,
        kwargs: &BTreeMap<String, JsonValue>,
        ctx: &ActionContext,
    ) -> Result<JsonValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push((kwargs.clone(), ctx.clone()));
        Ok(json!({ "status": "stored", "action": action, "key": kwargs.get("key") }))
    }
}

/// Text generator that records prompts and models
#[derive(Clone, Default)]
pub struct RecordingLlm {
    pub prompts: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl RecordingLlm {
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for RecordingLlm {
    fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push((prompt.to_string(), model.map(str::to_string)));
        Ok(format!("echo:{}", prompt))
    }
}

/// Text generator that always fails
pub struct FailingLlm;

impl TextGenerator for FailingLlm {
    fn generate(&self, _prompt: &str, _model: Option<&str>) -> Result<String> {
        Err(anyhow!("model backend unavailable"))
    }
}
