//! Model abstraction
//!
//! The agent only needs one capability from a provider: turn a conversation
//! into text. Streaming is optional; providers that cannot stream fall back to
//! a single chunk carrying the full response.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use crate::{IagentError, IagentResult};

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAI,
    LiteLLM,
    HuggingFace,
    Ollama,
    Bedrock,
}

impl ModelProvider {
    /// All provider types, in CLI order
    pub const ALL: [ModelProvider; 5] = [
        ModelProvider::OpenAI,
        ModelProvider::LiteLLM,
        ModelProvider::HuggingFace,
        ModelProvider::Ollama,
        ModelProvider::Bedrock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "openai",
            ModelProvider::LiteLLM => "litellm",
            ModelProvider::HuggingFace => "huggingface",
            ModelProvider::Ollama => "ollama",
            ModelProvider::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = IagentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAI),
            "litellm" => Ok(ModelProvider::LiteLLM),
            "huggingface" | "hf" => Ok(ModelProvider::HuggingFace),
            "ollama" => Ok(ModelProvider::Ollama),
            "bedrock" => Ok(ModelProvider::Bedrock),
            other => Err(IagentError::unknown_configuration(format!(
                "Unknown model type: {}",
                other
            ))),
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier (e.g. "gpt-4o-mini", "llama3.1")
    pub model: String,

    pub provider: ModelProvider,

    /// API key; when absent the provider reads its environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    pub timeout_secs: u64,

    /// Extra HTTP headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ModelConfig {
    pub fn new(provider: ModelProvider, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider,
            api_key: None,
            endpoint: None,
            temperature: 0.2,
            max_tokens: None,
            timeout_secs: 120,
            headers: HashMap::new(),
        }
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: MessageRole,
    pub content: String,
}

impl RequestMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request sent to a model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRequest {
    pub messages: Vec<RequestMessage>,

    /// Per-request temperature override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Per-request max tokens override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl ModelRequest {
    pub fn new(messages: Vec<RequestMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Single-turn request with an optional system prompt
    pub fn prompt(system: Option<&str>, user: impl Into<String>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(RequestMessage::system(system));
        }
        messages.push(RequestMessage::user(user));
        Self::new(messages)
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Model response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,

    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: Usage::default(),
        }
    }
}

/// Incremental piece of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    ContentDelta { delta: String },
    Done { usage: Usage },
}

/// Boxed stream of response chunks
pub type ModelStream = Pin<Box<dyn Stream<Item = IagentResult<StreamChunk>> + Send>>;

/// Core model trait
#[async_trait]
pub trait Model: Send + Sync {
    /// Generate a complete response
    async fn generate(&self, request: &ModelRequest) -> IagentResult<ModelResponse>;

    /// Generate a streamed response
    async fn generate_stream(&self, request: &ModelRequest) -> IagentResult<ModelStream> {
        let response = self.generate(request).await?;
        let chunks = vec![
            Ok(StreamChunk::ContentDelta {
                delta: response.content,
            }),
            Ok(StreamChunk::Done {
                usage: response.usage,
            }),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    /// Model configuration
    fn config(&self) -> &ModelConfig;

    /// Provider type
    fn provider(&self) -> ModelProvider {
        self.config().provider
    }
}
