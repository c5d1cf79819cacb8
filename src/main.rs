use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hydra::{
    ContextStore, FallbackExecutor, GenerationRequest, ProviderId, QueuedOutcome, RequestKind,
    RequestQueue,
};

#[derive(Parser)]
#[command(name = "hydra")]
#[command(about = "Resilient LLM text generation", long_about = None)]
struct Cli {
    /// Directory holding context fragment files
    #[arg(short, long, default_value = "./context")]
    context_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate text through the provider fallback chain
    Generate {
        /// The prompt to send
        prompt: String,

        /// System prompt for the request
        #[arg(short, long)]
        system: Option<String>,

        /// Maximum tokens to generate
        #[arg(long, default_value = "1024")]
        max_tokens: u32,

        /// Sampling temperature (0.0 - 2.0)
        #[arg(short, long, default_value = "0.7")]
        temperature: f32,

        /// Use exactly one provider instead of the fallback chain
        #[arg(short, long)]
        provider: Option<ProviderId>,

        /// Skip loading context fragments
        #[arg(long)]
        no_context: bool,

        /// Queue priority (higher runs first)
        #[arg(long, default_value = "0")]
        priority: i32,
    },

    /// Inspect context fragments
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// List fragment files currently present
    List,

    /// Print the assembled context blob
    Show,

    /// Check whether a fragment exists
    Check {
        /// Fragment file name, e.g. "characters.md"
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hydra=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let context = ContextStore::new(&cli.context_dir);

    match cli.command {
        Commands::Generate {
            prompt,
            system,
            max_tokens,
            temperature,
            provider,
            no_context,
            priority,
        } => {
            let executor = Arc::new(FallbackExecutor::from_env());
            if executor.provider_ids().is_empty() {
                return Err(anyhow!(
                    "No providers configured. Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY."
                ));
            }

            let mut request = GenerationRequest::new(prompt)
                .with_max_output_tokens(max_tokens)
                .with_temperature(temperature);

            let system = if no_context {
                system
            } else {
                merge_system_prompt(system, context.get_context(false).await)
            };
            if let Some(system) = system {
                request = request.with_system_prompt(system);
            }

            let queue = RequestQueue::new();
            let outcome = {
                let executor = executor.clone();
                let request = request.clone();
                queue
                    .queued_mutate(RequestKind::Generate, priority, None, move || async move {
                        let result = match provider {
                            Some(id) => {
                                executor
                                    .generate_with_specific_provider(id, &request)
                                    .await
                            }
                            None => executor.generate_with_fallback(&request).await,
                        };
                        result.map_err(anyhow::Error::from)
                    })
                    .await
            };

            match outcome {
                Ok(QueuedOutcome::Completed { value, .. }) => {
                    match &value.usage {
                        Some(usage) => tracing::info!(
                            "{}: {} prompt + {} completion tokens",
                            value.provider,
                            usage.prompt_tokens,
                            usage.completion_tokens
                        ),
                        None => tracing::info!("{}: no usage reported", value.provider),
                    }
                    println!("{}", value.text);
                }
                Ok(QueuedOutcome::Deferred { id }) => {
                    tracing::warn!("Request {} was queued but not admitted", id);
                }
                Err(e) => {
                    // Diagnostics stay in the logs; users get a plain failure
                    tracing::debug!("Generation failed: {:#}", e);
                    return Err(anyhow!("generation failed, try again"));
                }
            }
        }

        Commands::Context { action } => match action {
            ContextAction::List => {
                let names = context.list_fragments();
                if names.is_empty() {
                    println!("(no context fragments in {:?})", context.base_dir());
                } else {
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
            ContextAction::Show => {
                let blob = context.get_context(true).await;
                if blob.is_empty() {
                    println!("(no context fragments)");
                } else {
                    println!("{}", blob);
                }
            }
            ContextAction::Check { name } => {
                if context.fragment_exists(&name) {
                    println!("{}: present", name);
                } else {
                    println!("{}: missing", name);
                }
            }
        },
    }

    Ok(())
}

/// Prepend an explicit system prompt to the assembled context blob.
fn merge_system_prompt(system: Option<String>, context_blob: String) -> Option<String> {
    match (system, context_blob.is_empty()) {
        (Some(system), false) => Some(format!("{}\n\n{}", system, context_blob)),
        (Some(system), true) => Some(system),
        (None, false) => Some(context_blob),
        (None, true) => None,
    }
}
