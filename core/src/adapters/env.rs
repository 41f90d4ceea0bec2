//! Environment variable lookup for `env:` argument strings

use std::collections::BTreeMap;

pub trait EnvResolver: Send + Sync {
    /// Value of `key`, or `None` when unset
    fn resolve(&self, key: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvResolver for ProcessEnv {
    fn resolve(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed variables, for tests and embedding hosts
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl From<BTreeMap<String, String>> for MapEnv {
    fn from(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }
}

impl EnvResolver for MapEnv {
    fn resolve(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env_lookup() {
        let env = MapEnv::new().with("TOKEN", "abc");
        assert_eq!(env.resolve("TOKEN").as_deref(), Some("abc"));
        assert_eq!(env.resolve("OTHER"), None);
    }

    #[test]
    fn test_process_env_reads_path() {
        // PATH is set in every test environment we run in
        assert!(ProcessEnv.resolve("PATH").is_some());
        assert!(ProcessEnv.resolve("APL_SURELY_UNSET_VARIABLE_1234").is_none());
    }
}
