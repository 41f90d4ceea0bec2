//! Capability checks for steps
//!
//! A capability is granted when the runtime grants it (configuration or
//! `allow_storage`) or when the agent owning the task declares it.

use crate::adapters::STORAGE_CAPABILITY;
use crate::ast::{AgentDecl, Step, Task};
use crate::config::RuntimeConfig;
use crate::errors::{Error, Result};

pub(crate) fn is_granted(config: &RuntimeConfig, agent: Option<&AgentDecl>, capability: &str) -> bool {
    config.grants(capability) || agent.map(|a| a.declares(capability)).unwrap_or(false)
}

/// Every `requires capability.<id>` of `step` must be granted
pub(crate) fn check_step(
    config: &RuntimeConfig,
    agent: Option<&AgentDecl>,
    task: &Task,
    step: &Step,
) -> Result<()> {
    for capability in &step.requires {
        if is_granted(config, agent, capability) {
            continue;
        }
        tracing::warn!(task = %task.name, capability = %capability, "capability not granted");
        if capability.eq_ignore_ascii_case(STORAGE_CAPABILITY) {
            return Err(Error::StorageDisabled {
                task: task.name.clone(),
                step: step.raw.clone(),
                reason: "step requires capability.storage".to_string(),
            });
        }
        return Err(Error::MissingCapability {
            task: task.name.clone(),
            step: step.raw.clone(),
            capability: capability.clone(),
        });
    }
    Ok(())
}
