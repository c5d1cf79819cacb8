//! Fallback Executor Integration Tests
//!
//! Exercises the provider fallback chain end to end with scripted adapters:
//! - First-success-wins ordering
//! - Error aggregation when every provider fails
//! - Timeout and blank-payload handling
//! - The specific-provider bypass path

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hydra::{
    FallbackExecutor, GenerationError, GenerationRequest, ProviderAdapter, ProviderError,
    ProviderId, ProviderResponse, TokenUsage,
};

// ============================================================================
// Scripted adapter
// ============================================================================

enum Script {
    Succeed { text: &'static str, usage: Option<TokenUsage> },
    Blank,
    Fail(&'static str),
    Hang,
}

struct ScriptedProvider {
    id: ProviderId,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn new(id: ProviderId, script: Script) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(Self {
            id,
            script,
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
        match &self.script {
            Script::Succeed { text, usage } => Ok(ProviderResponse {
                text: text.to_string(),
                usage: *usage,
            }),
            Script::Blank => Ok(ProviderResponse {
                text: String::new(),
                usage: None,
            }),
            Script::Fail(message) => Err(ProviderError::Api {
                status: 503,
                message: message.to_string(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(ProviderResponse {
                    text: "too late".to_string(),
                    usage: None,
                })
            }
        }
    }
}

// ============================================================================
// Fallback ordering
// ============================================================================

#[tokio::test]
async fn test_first_provider_success_stops_the_chain() {
    let (p1, calls1) = ScriptedProvider::new(
        ProviderId::Gemini,
        Script::Succeed {
            text: "from gemini",
            usage: None,
        },
    );
    let (p2, calls2) = ScriptedProvider::new(
        ProviderId::OpenAi,
        Script::Succeed {
            text: "from openai",
            usage: None,
        },
    );

    let executor = FallbackExecutor::new(vec![p1, p2]);
    let result = executor
        .generate_with_fallback(&GenerationRequest::new("hi"))
        .await
        .unwrap();

    assert_eq!(result.text, "from gemini");
    assert_eq!(result.provider, ProviderId::Gemini);
    assert_eq!(calls1.load(Ordering::SeqCst), 1);
    assert_eq!(calls2.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timeout_then_fallback_succeeds() {
    let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Script::Hang);
    let (p2, _) = ScriptedProvider::new(
        ProviderId::OpenAi,
        Script::Succeed {
            text: "ok",
            usage: None,
        },
    );

    let executor = FallbackExecutor::new(vec![p1, p2]);
    let result = executor
        .generate_with_fallback(&GenerationRequest::new("hi"))
        .await
        .unwrap();

    assert_eq!(result.text, "ok");
    assert_eq!(result.provider, ProviderId::OpenAi);
    assert!(result.usage.is_none());
}

#[tokio::test]
async fn test_usage_is_forwarded_when_reported() {
    let (p1, _) = ScriptedProvider::new(
        ProviderId::Anthropic,
        Script::Succeed {
            text: "ok",
            usage: Some(TokenUsage {
                prompt_tokens: 11,
                completion_tokens: 22,
            }),
        },
    );

    let executor = FallbackExecutor::new(vec![p1]);
    let result = executor
        .generate_with_fallback(&GenerationRequest::new("hi"))
        .await
        .unwrap();

    assert_eq!(
        result.usage,
        Some(TokenUsage {
            prompt_tokens: 11,
            completion_tokens: 22
        })
    );
}

#[tokio::test]
async fn test_blank_payload_falls_through() {
    let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Script::Blank);
    let (p2, _) = ScriptedProvider::new(
        ProviderId::OpenAi,
        Script::Succeed {
            text: "real text",
            usage: None,
        },
    );

    let executor = FallbackExecutor::new(vec![p1, p2]);
    let result = executor
        .generate_with_fallback(&GenerationRequest::new("hi"))
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderId::OpenAi);
}

// ============================================================================
// Total failure
// ============================================================================

#[tokio::test]
async fn test_all_fail_reports_one_entry_per_provider() {
    let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Script::Fail("quota exhausted"));
    let (p2, _) = ScriptedProvider::new(ProviderId::OpenAi, Script::Hang);
    let (p3, _) = ScriptedProvider::new(ProviderId::Anthropic, Script::Blank);

    let executor = FallbackExecutor::new(vec![p1, p2, p3]);
    let error = executor
        .generate_with_fallback(&GenerationRequest::new("hi"))
        .await
        .unwrap_err();

    let errors = error.provider_errors();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors[0].0, ProviderId::Gemini);
    assert_eq!(errors[1].0, ProviderId::OpenAi);
    assert_eq!(errors[2].0, ProviderId::Anthropic);

    assert!(errors[0].1.contains("quota exhausted"));
    assert!(errors[1].1.contains("timed out"));
    assert!(errors[2].1.contains("empty response"));
}

#[tokio::test]
async fn test_empty_chain_fails_with_empty_map() {
    let executor = FallbackExecutor::new(vec![]);
    let error = executor
        .generate_with_fallback(&GenerationRequest::new("hi"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        GenerationError::AllProvidersFailed { ref errors } if errors.is_empty()
    ));
}

// ============================================================================
// Specific-provider bypass
// ============================================================================

#[tokio::test]
async fn test_specific_provider_skips_higher_priority_adapters() {
    let (p1, calls1) = ScriptedProvider::new(
        ProviderId::Gemini,
        Script::Succeed {
            text: "first",
            usage: None,
        },
    );
    let (p2, calls2) = ScriptedProvider::new(
        ProviderId::Anthropic,
        Script::Succeed {
            text: "picked",
            usage: None,
        },
    );

    let executor = FallbackExecutor::new(vec![p1, p2]);
    let result = executor
        .generate_with_specific_provider(ProviderId::Anthropic, &GenerationRequest::new("hi"))
        .await
        .unwrap();

    assert_eq!(result.text, "picked");
    assert_eq!(calls1.load(Ordering::SeqCst), 0);
    assert_eq!(calls2.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_specific_provider_failure_is_not_recovered() {
    let (p1, _) = ScriptedProvider::new(ProviderId::Gemini, Script::Fail("down"));
    let (p2, calls2) = ScriptedProvider::new(
        ProviderId::OpenAi,
        Script::Succeed {
            text: "would work",
            usage: None,
        },
    );

    let executor = FallbackExecutor::new(vec![p1, p2]);
    let error = executor
        .generate_with_specific_provider(ProviderId::Gemini, &GenerationRequest::new("hi"))
        .await
        .unwrap_err();

    // No fallback on the bypass path
    assert!(matches!(
        error,
        GenerationError::Provider {
            provider: ProviderId::Gemini,
            ..
        }
    ));
    assert_eq!(calls2.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unconfigured_provider_is_rejected() {
    let (p1, _) = ScriptedProvider::new(
        ProviderId::Gemini,
        Script::Succeed {
            text: "ok",
            usage: None,
        },
    );

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
