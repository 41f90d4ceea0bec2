//! APL: a line-oriented language for agent workflows
//!
//! Source text is parsed into a [`Program`], executed step by step by a
//! [`Runtime`] against pluggable text-generation, storage and environment
//! adapters, and exported as a hashed graph IR with [`to_graph`].

pub mod adapters;
pub mod ast;
pub mod config;
pub mod errors;
pub mod eval;
pub mod ir;
pub mod parser;
pub mod runtime;

pub use adapters::{
    ActionContext, EnvResolver, MapEnv, MockLlm, MockStorageAdapter, ProcessEnv, StorageAdapter,
    TextGenerator,
};
pub use ast::{Action, AgentDecl, Program, Step, Task};
pub use config::RuntimeConfig;
pub use errors::{Error, ErrorKind, Result};
pub use ir::{to_graph, validate_graph, verify_integrity, IrGraph, IrNode, SchemaError};
pub use parser::{parse, parse_with_notes, RecoveryKind, RecoveryNote};
pub use runtime::{ExecutionContext, ExecutionResult, Runtime, RuntimeBuilder};
