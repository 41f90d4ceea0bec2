//! Text generation backend used by `call_llm` steps

use anyhow::Result;

/// Model name used when neither the step nor the config picks one
pub const DEFAULT_MODEL: &str = "mock";

pub trait TextGenerator: Send + Sync {
    /// Produce a completion for `prompt`; `model` is `None` to use the backend default
    fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String>;
}

/// Deterministic offline generator: `"[mocked:<model>] <prompt>"`
#[derive(Debug, Clone)]
pub struct MockLlm {
    default_model: String,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_default_model(model: impl Into<String>) -> Self {
        Self {
            default_model: model.into(),
        }
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl TextGenerator for MockLlm {
    fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let model = model.unwrap_or(&self.default_model);
        Ok(format!("[mocked:{}] {}", model, prompt.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_output_shape() {
        let llm = MockLlm::new();
        assert_eq!(llm.generate("  hi \n", None).unwrap(), "[mocked:mock] hi");
        assert_eq!(
            llm.generate("hi", Some("gpt-x")).unwrap(),
            "[mocked:gpt-x] hi"
        );
    }

    #[test]
    fn test_custom_default_model() {
        let llm = MockLlm::with_default_model("local");
        assert_eq!(llm.generate("q", None).unwrap(), "[mocked:local] q");
    }
}
