//! Runtime configuration
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults ([`RuntimeConfig::default`])
//! 2. an optional config file, format picked from its extension
//! 3. `APL_*` environment variables, e.g. `APL_ALLOW_STORAGE=true` or
//!    `APL_CAPABILITIES=network,storage`

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::adapters::DEFAULT_MODEL;
use crate::adapters::STORAGE_CAPABILITY;
use crate::errors::{Error, Result};

const ENV_PREFIX: &str = "APL";
const LIST_KEYS: &[&str] = &["capabilities", "blocked_integrations"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Grants `storage` to every task
    pub allow_storage: bool,
    /// Capabilities granted to every task, lower-case
    pub capabilities: Vec<String>,
    /// Model passed to the text generator when a step names none
    pub default_model: String,
    /// Dotted tool prefixes that fail with `UnsupportedAction`
    pub blocked_integrations: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            allow_storage: false,
            capabilities: Vec::new(),
            default_model: DEFAULT_MODEL.to_string(),
            blocked_integrations: vec!["slack".to_string()],
        }
    }
}

impl RuntimeConfig {
    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    fn load_from(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let mut environment = config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .source(env);
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }
        builder = builder.add_source(environment);

        let loaded: RuntimeConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;
        let loaded = loaded.normalized();
        tracing::debug!(?loaded, "runtime config loaded");
        Ok(loaded)
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let parsed: RuntimeConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        Ok(parsed.normalized())
    }

    /// Whether `capability` is granted by configuration alone
    pub fn grants(&self, capability: &str) -> bool {
        if capability.eq_ignore_ascii_case(STORAGE_CAPABILITY) && self.allow_storage {
            return true;
        }
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }

    pub fn blocks(&self, integration: &str) -> bool {
        self.blocked_integrations
            .iter()
            .any(|b| b.eq_ignore_ascii_case(integration))
    }

    fn normalized(mut self) -> Self {
        for list in [&mut self.capabilities, &mut self.blocked_integrations] {
            let mut seen: Vec<String> = Vec::new();
            for item in list.drain(..) {
                let item = item.trim().to_ascii_lowercase();
                if !item.is_empty() && !seen.contains(&item) {
                    seen.push(item);
                }
            }
            *list = seen;
        }
        self
    }
}
