//! Error types shared by every iagent crate

use thiserror::Error;

/// Result alias used across the workspace
pub type IagentResult<T> = Result<T, IagentError>;

/// Top-level error type
///
/// Variants follow the failure taxonomy of the agent: recoverable line-level
/// parse failures, tool-level failures surfaced to the model, provider
/// failures, and configuration errors that fail before any model call.
#[derive(Debug, Error)]
pub enum IagentError {
    /// A single log line could not be parsed. Tallied, never fatal.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Not one line in the input parsed under the declared format
    #[error("No valid log lines found ({lines} lines read, format: {format})")]
    NoValidLogLines { lines: usize, format: String },

    /// Model provider or remote tool backend failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// Invalid model type or agent type
    #[error("Unknown configuration: {0}")]
    UnknownConfiguration(String),

    /// Tool execution failure
    #[error("Tool error: {0}")]
    Tool(String),

    /// Invalid argument passed to a tool or component
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration loading failure
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl IagentError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn unknown_configuration(msg: impl Into<String>) -> Self {
        Self::UnknownConfiguration(msg.into())
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error came from a model provider or remote backend
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_valid_lines_message() {
        let err = IagentError::NoValidLogLines {
            lines: 3,
            format: "nginx".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No valid log lines found (3 lines read, format: nginx)"
        );
    }

    #[test]
    fn test_provider_classification() {
        assert!(IagentError::provider("rate limited").is_provider());
        assert!(!IagentError::tool("boom").is_provider());
    }

    #[test]
    fn test_from_serde_json() {
        let err: IagentError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, IagentError::Serialization(_)));
    }
}
