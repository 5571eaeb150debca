//! Tool abstraction
//!
//! Every tool the agent can call implements [`Tool`]: a name, a description,
//! a JSON-schema parameter block, and an async `execute`. Tools are looked up
//! by name through a [`ToolExecutor`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{IagentError, IagentResult};

/// Core tool trait
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with the given input
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult>;

    /// Tool configuration (name, description, parameters)
    fn config(&self) -> &ToolConfig;

    /// Tool name
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Definition exposed to the model
    fn definition(&self) -> ToolDefinition {
        let config = self.config();
        ToolDefinition {
            name: config.name.clone(),
            description: config.description.clone(),
            parameters: config.parameters.clone(),
        }
    }
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    pub description: String,
    /// JSON schema of the accepted arguments
    pub parameters: serde_json::Value,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Tool definition as shown to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: serde_json::Value,
}

fn empty_arguments() -> serde_json::Value {
    serde_json::json!({})
}

/// Tool input arguments
#[derive(Debug, Clone)]
pub struct ToolInput {
    pub arguments: serde_json::Value,
}

impl ToolInput {
    pub fn new(arguments: serde_json::Value) -> Self {
        Self { arguments }
    }

    /// Get a typed argument
    pub fn get_arg<T: DeserializeOwned>(&self, name: &str) -> IagentResult<T> {
        let value = self
            .arguments
            .get(name)
            .ok_or_else(|| IagentError::invalid_argument(format!("Missing argument: {}", name)))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            IagentError::invalid_argument(format!("Invalid argument '{}': {}", name, e))
        })
    }

    /// Get an optional typed argument; null counts as absent
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> IagentResult<Option<T>> {
        match self.arguments.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(_) => self.get_arg(name).map(Some),
        }
    }
}

/// Tool execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time_ms: u64,
}

impl ToolResult {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            execution_time_ms: 0,
        }
    }

    /// Successful result carrying plain text
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(serde_json::Value::String(text.into()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(message.into()),
            execution_time_ms: 0,
        }
    }

    pub fn with_execution_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    /// Render the result as the text observation fed back to the model
    pub fn to_observation(&self) -> String {
        if !self.success {
            return format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("tool execution failed")
            );
        }
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

/// Name-based tool dispatch
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute the named tool
    async fn execute_tool(&self, name: &str, input: ToolInput) -> IagentResult<ToolResult>;

    /// Definitions of every available tool
    fn list_tools(&self) -> Vec<ToolDefinition>;

    /// Look up a tool by name
    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_arg_typed() {
        let input = ToolInput::new(json!({"file_path": "/var/log/x", "window_minutes": 15}));
        let path: String = input.get_arg("file_path").unwrap();
        let window: u64 = input.get_arg("window_minutes").unwrap();
        assert_eq!(path, "/var/log/x");
        assert_eq!(window, 15);

        let missing = input.get_arg::<String>("log_type");
        assert!(matches!(missing, Err(IagentError::InvalidArgument(_))));
    }

    #[test]
    fn test_get_opt_treats_null_as_absent() {
        let input = ToolInput::new(json!({"limit": null, "repo": "a/b"}));
        assert_eq!(input.get_opt::<u32>("limit").unwrap(), None);
        assert_eq!(input.get_opt::<String>("repo").unwrap(), Some("a/b".to_string()));
        assert!(input.get_opt::<u32>("repo").is_err());
    }

    #[test]
    fn test_observation_rendering() {
        assert_eq!(ToolResult::text("plain").to_observation(), "plain");
        assert_eq!(
            ToolResult::error("no such file").to_observation(),
            "Error: no such file"
        );
        let obs = ToolResult::success(json!({"cpu": 12.5})).to_observation();
        assert!(obs.contains("\"cpu\": 12.5"));
    }

    #[test]
    fn test_tool_call_default_arguments() {
        let call: ToolCall = serde_json::from_str(r#"{"name": "system_monitor"}"#).unwrap();
        assert_eq!(call.arguments, json!({}));
    }
}
