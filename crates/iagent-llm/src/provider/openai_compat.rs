//! OpenAI chat-completions client
//!
//! Every supported provider exposes this protocol (OpenAI itself, LiteLLM
//! proxies, the Hugging Face router, Ollama's `/v1` surface and Bedrock's
//! OpenAI-compatible endpoint), so one client covers them all.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use super::{resolve_endpoint, ProviderEndpoint};
use iagent_core::{
    IagentError, IagentResult, Model, ModelConfig, ModelRequest, ModelResponse, ModelStream,
    RequestMessage, StreamChunk, Usage,
};

/// Client for an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAICompatModel {
    config: ModelConfig,
    endpoint: ProviderEndpoint,
    client: reqwest::Client,
}

impl OpenAICompatModel {
    /// Create a client, resolving endpoint and key from the environment
    pub fn new(config: ModelConfig) -> IagentResult<Self> {
        let endpoint = resolve_endpoint(&config, |key| std::env::var(key).ok())?;
        Self::with_endpoint(config, endpoint)
    }

    pub fn with_endpoint(config: ModelConfig, endpoint: ProviderEndpoint) -> IagentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IagentError::provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.base_url)
    }

    fn build_body<'a>(&'a self, request: &'a ModelRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            stop: &request.stop,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> IagentResult<reqwest::Response> {
        let mut builder = self.client.post(self.completions_url()).json(body);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }
        for (name, value) in &self.config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                provider = %self.config.provider,
                status = status.as_u16(),
                "Model request rejected"
            );
            return Err(classify_status(status.as_u16(), &text));
        }
        Ok(response)
    }
}

#[async_trait]
impl Model for OpenAICompatModel {
    async fn generate(&self, request: &ModelRequest) -> IagentResult<ModelResponse> {
        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let body = self.build_body(request, false);
        let response = self.send(&body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| IagentError::provider(format!("Failed to read response body: {}", e)))?;

        parse_completion(&text)
    }

    async fn generate_stream(&self, request: &ModelRequest) -> IagentResult<ModelStream> {
        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            "Sending streaming chat completion request"
        );

        let body = self.build_body(request, true);
        let response = self.send(&body).await?;
        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec())));

        let state = StreamState {
            body: bytes,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            usage: Usage::default(),
            done_sent: false,
            finished: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(bytes)) => {
                        for event in state.decoder.push(&bytes) {
                            state.handle(event);
                        }
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        state.pending.push_back(Err(classify_transport_error(e)));
                    }
                    None => {
                        for event in state.decoder.finish() {
                            state.handle(event);
                        }
                        state.send_done();
                        state.finished = true;
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

struct StreamState {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<IagentResult<StreamChunk>>,
    usage: Usage,
    done_sent: bool,
    finished: bool,
}

impl StreamState {
    fn handle(&mut self, event: SseEvent) {
        match event {
            SseEvent::Data(data) => match serde_json::from_str::<StreamResponse>(&data) {
                Ok(chunk) => {
                    if let Some(usage) = chunk.usage {
                        self.usage = usage.into();
                    }
                    for choice in chunk.choices {
                        if let Some(delta) = choice.delta.and_then(|d| d.content) {
                            if !delta.is_empty() {
                                self.pending.push_back(Ok(StreamChunk::ContentDelta { delta }));
                            }
                        }
                    }
                }
                Err(e) => {
                    self.pending.push_back(Err(IagentError::provider(format!(
                        "Malformed stream chunk: {}",
                        e
                    ))));
                    self.finished = true;
                }
            },
            SseEvent::Done => {
                self.send_done();
                self.finished = true;
            }
        }
    }

    fn send_done(&mut self) {
        if !self.done_sent {
            self.done_sent = true;
            self.pending
                .push_back(Ok(StreamChunk::Done { usage: self.usage }));
        }
    }
}

/// Server-sent event payload
#[derive(Debug, Clone, PartialEq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Incremental `text/event-stream` line decoder
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }
}

fn decode_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        Some(SseEvent::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

fn parse_completion(body: &str) -> IagentResult<ModelResponse> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| IagentError::provider(format!("Failed to parse response: {}", e)))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| IagentError::provider("No choices returned in response"))?;

    Ok(ModelResponse {
        content,
        usage: response.usage.map(Usage::from).unwrap_or_default(),
    })
}

fn classify_status(status: u16, body: &str) -> IagentError {
    let body = body.trim();
    match status {
        401 | 403 => IagentError::provider(format!("Authentication failed ({}): {}", status, body)),
        404 => IagentError::provider(format!("Model or endpoint not found: {}", body)),
        408 | 504 => IagentError::provider(format!("Request timed out ({}): {}", status, body)),
        429 => IagentError::provider(format!("Rate limit exceeded: {}", body)),
        500..=599 => IagentError::provider(format!("Server error ({}): {}", status, body)),
        _ => IagentError::provider(format!("Request failed ({}): {}", status, body)),
    }
}

fn classify_transport_error(err: reqwest::Error) -> IagentError {
    if err.is_timeout() {
        IagentError::provider(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        IagentError::provider(format!("Connection failed: {}", err))
    } else {
        IagentError::provider(format!("Network error: {}", err))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [RequestMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    stop: &'a [String],
    stream: bool,
}

fn is_empty_slice(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

impl From<ApiUsage> for Usage {
    fn from(usage: ApiUsage) -> Self {
        Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}
