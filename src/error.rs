//! Error types for provider calls and fallback execution.
//!
//! A single failed provider attempt is a [`ProviderError`]; it is always
//! recovered locally by the fallback loop. [`GenerationError`] is the only
//! error type that crosses the executor boundary.

use thiserror::Error;

use crate::providers::ProviderId;

/// Failure of one provider attempt
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The per-provider time bound elapsed
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// No API key configured for the provider
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    /// Provider reported success but the payload was blank
    #[error("Provider returned an empty response")]
    EmptyResponse,

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.to_string())
    }
}

/// Error surface of the fallback executor
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Every configured provider failed. Carries one entry per provider in
    /// priority order so the caller can see which layer broke.
    #[error("All providers failed: {}", format_provider_errors(.errors))]
    AllProvidersFailed { errors: Vec<(ProviderId, String)> },

    /// A single named provider failed (specific-provider path)
    #[error("Provider {provider} failed: {source}")]
    Provider {
        provider: ProviderId,
        #[source]
        source: ProviderError,
    },

    /// The named provider is not part of the configured set
    #[error("Provider not configured: {0}")]
    NotConfigured(ProviderId),
}

impl GenerationError {
    /// Per-provider diagnostic map for [`GenerationError::AllProvidersFailed`]
    pub fn provider_errors(&self) -> &[(ProviderId, String)] {
        match self {
            GenerationError::AllProvidersFailed { errors } => errors,
            _ => &[],
        }
    }
}

fn format_provider_errors(errors: &[(ProviderId, String)]) -> String {
    errors
        .iter()
        .map(|(provider, message)| format!("{}: {}", provider, message))
        .collect::<Vec<_>>()
        .join("; ")
}
