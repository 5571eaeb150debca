// iagent core - shared types and traits for the iagent workspace
//
// Model and tool abstractions, the error type, and the agent trace types that
// the runtime produces and the CLI renders.

pub mod agent;
pub mod error;
pub mod model;
pub mod tool;

pub use agent::{
    AgentConfig, AgentEvent, AgentRunResult, AgentStep, AgentType, RunOutcome, ToolInvocation,
};
pub use error::{IagentError, IagentResult};
pub use model::{
    MessageRole, Model, ModelConfig, ModelProvider, ModelRequest, ModelResponse, ModelStream,
    RequestMessage, StreamChunk, Usage,
};
pub use tool::{
    Tool, ToolCall, ToolConfig, ToolDefinition, ToolExecutor, ToolInput, ToolResult,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default model id when neither flag nor environment provides one
pub const DEFAULT_MODEL_ID: &str = "gpt-4o-mini";
