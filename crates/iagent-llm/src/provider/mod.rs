//! Provider endpoint and credential resolution

pub mod openai_compat;

pub use openai_compat::OpenAICompatModel;

use iagent_core::{IagentError, IagentResult, ModelConfig, ModelProvider};

const DEFAULT_BEDROCK_REGION: &str = "us-east-1";

/// Resolved connection settings for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEndpoint {
    /// Base URL ending in `/v1` (no trailing slash)
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Environment variable holding the provider's API key
pub fn api_key_env(provider: ModelProvider) -> Option<&'static str> {
    match provider {
        ModelProvider::OpenAI => Some("OPENAI_API_KEY"),
        ModelProvider::LiteLLM => Some("LITELLM_API_KEY"),
        ModelProvider::HuggingFace => Some("HF_TOKEN"),
        ModelProvider::Bedrock => Some("AWS_BEARER_TOKEN_BEDROCK"),
        ModelProvider::Ollama => None,
    }
}

fn requires_key(provider: ModelProvider) -> bool {
    matches!(
        provider,
        ModelProvider::OpenAI | ModelProvider::HuggingFace | ModelProvider::Bedrock
    )
}

/// Resolve base URL and key from config, falling back to the environment
///
/// `env` is injected so resolution can be tested without touching the
/// process environment.
pub fn resolve_endpoint<F>(config: &ModelConfig, env: F) -> IagentResult<ProviderEndpoint>
where
    F: Fn(&str) -> Option<String>,
{
    let base_url = match &config.endpoint {
        Some(endpoint) => endpoint.clone(),
        None => match config.provider {
            ModelProvider::OpenAI => {
                env("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            }
            ModelProvider::LiteLLM => {
                env("LITELLM_BASE_URL").unwrap_or_else(|| "http://localhost:4000/v1".to_string())
            }
            ModelProvider::HuggingFace => env("HF_BASE_URL")
                .unwrap_or_else(|| "https://router.huggingface.co/v1".to_string()),
            ModelProvider::Ollama => {
                let host =
                    env("OLLAMA_HOST").unwrap_or_else(|| "http://localhost:11434".to_string());
                let host = if host.contains("://") {
                    host
                } else {
                    format!("http://{}", host)
                };
                format!("{}/v1", host.trim_end_matches('/'))
            }
            ModelProvider::Bedrock => {
                let region =
                    env("AWS_REGION").unwrap_or_else(|| DEFAULT_BEDROCK_REGION.to_string());
                format!("https://bedrock-runtime.{}.amazonaws.com/openai/v1", region)
            }
        },
    };

    let api_key = config
        .api_key
        .clone()
        .or_else(|| api_key_env(config.provider).and_then(|var| env(var)))
        .filter(|key| !key.is_empty());

    if api_key.is_none() && requires_key(config.provider) {
        let var = api_key_env(config.provider).unwrap_or("API key");
        return Err(IagentError::config(format!(
            "{} is not set (required for the {} provider)",
            var, config.provider
        )));
    }

    Ok(ProviderEndpoint {
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key,
    })
}
