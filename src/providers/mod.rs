//! Provider adapters for the supported text-generation backends.
//!
//! Each backing service implements [`ProviderAdapter`] once; the fallback
//! executor is polymorphic over the trait and never branches on provider
//! identity except to tag results.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::request::{GenerationRequest, TokenUsage};

/// Default per-call time bound enforced by the executor
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Identity of a backing service, in default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    OpenAi,
    Anthropic,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderId::Gemini),
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" => Ok(ProviderId::Anthropic),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Raw adapter output before the executor tags it with the provider id
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// The single-shot generation capability, implemented once per backing
/// service.
///
/// Adapters normalize their provider's response shape (including token
/// accounting) into [`ProviderResponse`] and surface failures as
/// [`ProviderError`]. Every call must stay within [`ProviderAdapter::timeout`];
/// the executor enforces the bound externally.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identity used for ordering and result tagging
    fn id(&self) -> ProviderId;

    /// Upper bound for a single generation call
    fn timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }

    /// Perform one generation attempt
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderError>;
}
