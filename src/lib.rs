pub mod context_store;
pub mod error;
pub mod executor;
pub mod providers;
pub mod queue;
pub mod request;

pub use context_store::ContextStore;
pub use error::{GenerationError, ProviderError};
pub use executor::FallbackExecutor;
pub use providers::{
    AnthropicProvider, GeminiProvider, OpenAiProvider, ProviderAdapter, ProviderId,
    ProviderResponse,
};
pub use queue::{
    QueueItem, QueueItemStatus, QueueStats, QueuedOutcome, RateLimitState, RequestKind,
    RequestQueue,
};
pub use request::{GenerationRequest, GenerationResult, TokenUsage};
