//! Storage backend used by `store` steps

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Capability name an adapter must advertise to receive `store` calls
pub const STORAGE_CAPABILITY: &str = "storage";

/// Who is asking, passed along with every storage action for auditing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionContext {
    /// Qualified task name, e.g. `"archiver.save"`
    pub task: String,
    /// Agent owning the task; `None` for `main`
    pub agent: Option<String>,
    pub program_meta: Map<String, JsonValue>,
}

pub trait StorageAdapter: Send + Sync {
    /// Capability names this adapter provides
    fn capabilities(&self) -> Vec<String>;

    /// Perform `action` (currently always `"store"`) with evaluated keyword arguments
    fn perform(
        &self,
        action: &str,
        kwargs: &BTreeMap<String, JsonValue>,
        ctx: &ActionContext,
    ) -> Result<JsonValue>;
}

/// Result shape returned by the bundled adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResult {
    pub status: String,
    pub key: String,
    pub meta: Map<String, JsonValue>,
}

/// Records nothing; reports what it would have stored under `base_path`
#[derive(Debug, Clone)]
pub struct MockStorageAdapter {
    base_path: PathBuf,
}

impl MockStorageAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Default for MockStorageAdapter {
    fn default() -> Self {
        Self::new("./data")
    }
}

impl StorageAdapter for MockStorageAdapter {
    fn capabilities(&self) -> Vec<String> {
        vec![STORAGE_CAPABILITY.to_string()]
    }

    fn perform(
        &self,
        action: &str,
        kwargs: &BTreeMap<String, JsonValue>,
        ctx: &ActionContext,
    ) -> Result<JsonValue> {
        if action != "store" {
            bail!("unsupported storage action '{}'", action);
        }

        let key = kwargs
            .get("key")
            .or_else(|| kwargs.get("path"))
            .map(crate::eval::display)
            .unwrap_or_else(|| "item".to_string());
        let size = kwargs
            .get("content")
            .or_else(|| kwargs.get("value"))
            .map(|v| crate::eval::display(v).len())
            .unwrap_or(0);

        tracing::info!(task = %ctx.task, key = %key, size, "mock storage write");

        let mut meta = Map::new();
        meta.insert("requesting_task".to_string(), json!(ctx.task));
        meta.insert("agent".to_string(), json!(ctx.agent));
        meta.insert("key".to_string(), json!(key));
        meta.insert("size".to_string(), json!(size));
        meta.insert(
            "base_path".to_string(),
            json!(self.base_path.display().to_string()),
        );

        let result = StorageResult {
            status: "ok".to_string(),
            key,
            meta,
        };
        Ok(serde_json::to_value(result)?)
    }
}
