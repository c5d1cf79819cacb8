//! Unified request/response types for text generation.

use serde::{Deserialize, Serialize};

use crate::providers::ProviderId;

/// A single generation request, immutable once built.
///
/// Defaults match what the adapters can portably honor; `temperature` is
/// clamped to `[0, 2]` and `max_output_tokens` is kept positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_output_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }
}

/// Normalized result of one successful generation.
///
/// Produced exactly once per successful attempt; `provider` identifies the
/// adapter that answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub provider: ProviderId,
    /// Token accounting, absent when the provider does not report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Common token-accounting shape across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("Write a scene")
            .with_system_prompt("You are a novelist")
            .with_max_output_tokens(256)
            .with_temperature(1.2);

        assert_eq!(request.prompt, "Write a scene");
        assert_eq!(request.system_prompt.as_deref(), Some("You are a novelist"));
        assert_eq!(request.max_output_tokens, 256);
        assert_eq!(request.temperature, 1.2);
    }

    #[test]
    fn test_request_bounds_clamped() {
        let request = GenerationRequest::new("x")
            .with_max_output_tokens(0)
            .with_temperature(5.0);

        assert_eq!(request.max_output_tokens, 1);
        assert_eq!(request.temperature, 2.0);

        let request = GenerationRequest::new("x").with_temperature(-1.0);
        assert_eq!(request.temperature, 0.0);
    }

    #[test]
    fn test_result_serializes_without_usage() {
        let result = GenerationResult {
            text: "ok".to_string(),
            provider: ProviderId::OpenAi,
            usage: None,
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("usage"));
        assert!(json.contains("\"provider\":\"openai\""));
    }
}
