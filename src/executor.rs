//! Provider fallback execution: first success wins.
//!
//! The executor holds a fixed, ordered list of provider adapters and tries
//! them in priority order until one succeeds. Partial failures are recovered
//! here and stay invisible to the caller; total failure surfaces as
//! [`GenerationError::AllProvidersFailed`] with one diagnostic entry per
//! configured provider. This layer never retries the whole chain on its own.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{GenerationError, ProviderError};
use crate::providers::{
    AnthropicProvider, GeminiProvider, OpenAiProvider, ProviderAdapter, ProviderId,
};
use crate::request::{GenerationRequest, GenerationResult};

pub struct FallbackExecutor {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl FallbackExecutor {
    /// Create an executor over adapters in the given priority order.
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        debug!("Creating fallback executor with {} providers", providers.len());
        Self { providers }
    }

    /// Build the default chain from environment keys.
    ///
    /// Providers whose key variable (`GEMINI_API_KEY`, `OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY`) is unset are left out; the rest keep the fixed
    /// priority order Gemini → OpenAI → Anthropic.
    pub fn from_env() -> Self {
        let mut providers: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            providers.push(Arc::new(GeminiProvider::new(key)));
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            providers.push(Arc::new(OpenAiProvider::new(key)));
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            providers.push(Arc::new(AnthropicProvider::new(key)));
        }

        Self::new(providers)
    }

    /// Configured provider identities, in priority order.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Try providers in priority order; the first success is returned and
    /// later providers are never invoked.
    pub async fn generate_with_fallback(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let mut errors: Vec<(ProviderId, String)> = Vec::new();

        for provider in &self.providers {
            match self.invoke(provider.as_ref(), request).await {
                Ok(result) => {
                    info!("Generation succeeded via {}", result.provider);
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.id(), e);
                    errors.push((provider.id(), e.to_string()));
                }
            }
        }

        Err(GenerationError::AllProvidersFailed { errors })
    }

    /// Invoke exactly one named adapter, bypassing the fallback order.
    ///
    /// Shares the invocation path with the fallback loop so request shaping
    /// and timeout handling stay identical. Intended for diagnostics.
    pub async fn generate_with_specific_provider(
        &self,
        provider_id: ProviderId,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.id() == provider_id)
            .ok_or(GenerationError::NotConfigured(provider_id))?;

        self.invoke(provider.as_ref(), request)
            .await
            .map_err(|source| GenerationError::Provider {
                provider: provider_id,
                source,
            })
    }

    /// Single-attempt invocation shared by both public paths: bounded
    /// timeout, blank-payload rejection, result tagging.
    async fn invoke(
        &self,
        provider: &dyn ProviderAdapter,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        let timeout = provider.timeout();
        debug!("Invoking {} (timeout {}s)", provider.id(), timeout.as_secs());

        let response = tokio::time::timeout(timeout, provider.generate(request))
            .await
            .map_err(|_| ProviderError::Timeout {
                seconds: timeout.as_secs(),
            })??;

        if response.text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(GenerationResult {
            text: response.text,
            provider: provider.id(),
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::providers::ProviderResponse;

    enum Outcome {
        Succeed(&'static str),
        Blank,
        Fail(&'static str),
        Hang,
    }

    struct ScriptedProvider {
        id: ProviderId,
        outcome: Outcome,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(id: ProviderId, outcome: Outcome) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Arc::new(Self {
                id,
                outcome,
                calls: calls.clone(),
            });
            (provider, calls)
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Outcome::Succeed(text) => Ok(ProviderResponse {
                    text: text.to_string(),
                    usage: None,
                }),
                Outcome::Blank => Ok(ProviderResponse {
                    text: "   ".to_string(),
                    usage: None,
                }),
                Outcome::Fail(message) => Err(ProviderError::Api {
                    status: 500,
                    message: message.to_string(),
                }),
                Outcome::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(ProviderResponse {
                        text: "too late".to_string(),
                        usage: None,
                    })
                }
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Outcome::Fail("down"));
        let (p2, _) = ScriptedProvider::new(ProviderId::OpenAi, Outcome::Succeed("ok"));
        let (p3, calls3) = ScriptedProvider::new(ProviderId::Anthropic, Outcome::Succeed("never"));

        let executor = FallbackExecutor::new(vec![p1, p2, p3]);
        let result = executor
            .generate_with_fallback(&GenerationRequest::new("hi"))
            .await
            .unwrap();

        assert_eq!(result.text, "ok");
        assert_eq!(result.provider, ProviderId::OpenAi);
        assert_eq!(calls3.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_falls_through() {
        let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Outcome::Hang);
        let (p2, _) = ScriptedProvider::new(ProviderId::OpenAi, Outcome::Succeed("ok"));

        let executor = FallbackExecutor::new(vec![p1, p2]);
        let result = executor
            .generate_with_fallback(&GenerationRequest::new("hi"))
            .await
            .unwrap();

        assert_eq!(result.provider, ProviderId::OpenAi);
        assert!(result.usage.is_none());
    }

    #[tokio::test]
    async fn test_blank_payload_is_a_failure() {
        let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Outcome::Blank);
        let (p2, _) = ScriptedProvider::new(ProviderId::OpenAi, Outcome::Succeed("real"));

        let executor = FallbackExecutor::new(vec![p1, p2]);
        let result = executor
            .generate_with_fallback(&GenerationRequest::new("hi"))
            .await
            .unwrap();

        assert_eq!(result.text, "real");
    }

    #[tokio::test]
    async fn test_all_fail_collects_every_error() {
        let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Outcome::Fail("quota"));
        let (p2, _) = ScriptedProvider::new(ProviderId::OpenAi, Outcome::Fail("auth"));

        let executor = FallbackExecutor::new(vec![p1, p2]);
        let error = executor
            .generate_with_fallback(&GenerationRequest::new("hi"))
            .await
            .unwrap_err();

        let errors = error.provider_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, ProviderId::Gemini);
        assert_eq!(errors[1].0, ProviderId::OpenAi);
        assert!(errors[0].1.contains("quota"));
    }

    #[tokio::test]
    async fn test_specific_provider_bypasses_order() {
        let (p1, calls1) = ScriptedProvider::new(ProviderId::Gemini, Outcome::Succeed("first"));
        let (p2, _) = ScriptedProvider::new(ProviderId::Anthropic, Outcome::Succeed("second"));

        let executor = FallbackExecutor::new(vec![p1, p2]);
        let result = executor
            .generate_with_specific_provider(ProviderId::Anthropic, &GenerationRequest::new("hi"))
            .await
            .unwrap();

        assert_eq!(result.provider, ProviderId::Anthropic);
        assert_eq!(calls1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_specific_provider_not_configured() {
        let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Outcome::Succeed("ok"));
        let executor = FallbackExecutor::new(vec![p1]);

        let error = executor
            .generate_with_specific_provider(ProviderId::OpenAi, &GenerationRequest::new("hi"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            GenerationError::NotConfigured(ProviderId::OpenAi)
        ));
    }
}
