//! Pluggable collaborators of the runtime
//!
//! The runtime never talks to a model, a storage backend or the process
//! environment directly; it goes through these traits. Each trait ships with a
//! deterministic default so programs run offline.

mod env;
mod llm;
mod storage;

pub use env::{EnvResolver, MapEnv, ProcessEnv};
pub use llm::{MockLlm, TextGenerator, DEFAULT_MODEL};
pub use storage::{ActionContext, MockStorageAdapter, StorageAdapter, StorageResult, STORAGE_CAPABILITY};
