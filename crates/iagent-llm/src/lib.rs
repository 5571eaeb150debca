// iagent LLM - model provider clients
//
// All providers are reached through an OpenAI-compatible chat-completions
// client; the factory resolves endpoint and credentials per provider type.

pub mod provider;

use std::sync::Arc;

use iagent_core::{IagentResult, Model, ModelConfig};
use tracing::info;

pub use provider::{resolve_endpoint, OpenAICompatModel, ProviderEndpoint};

/// Model factory
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a model instance for the configured provider
    pub fn create(config: ModelConfig) -> IagentResult<Arc<dyn Model>> {
        let model = OpenAICompatModel::new(config)?;
        info!(
            provider = %model.config().provider,
            model = %model.config().model,
            endpoint = %model.base_url(),
            "Model client ready"
        );
        Ok(Arc::new(model))
    }
}

/// Convenience wrapper around [`ProviderFactory::create`]
pub fn create_model(config: ModelConfig) -> IagentResult<Arc<dyn Model>> {
    ProviderFactory::create(config)
}
