//! Tool implementations
//!
//! - `parse_logs` - windowed log analysis with model recommendations
//! - `web_search` - DuckDuckGo instant answers
//! - `system_monitor` - host resource snapshot
//! - `get_cicd_status`, `debug_cicd_failure`, `analyze_cicd_patterns` - GitHub Actions
//! - `final_answer` - terminates the agent run

pub mod cicd;
pub mod final_answer;
pub mod parse_logs;
pub mod system_monitor;
pub mod web_search;

/// Common utilities for tool implementations
pub mod common {
    use iagent_core::ToolConfig;

    /// Create a standard JSON schema for a tool with required and optional parameters
    pub fn create_schema(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Create a basic tool config
    pub fn tool_config(name: &str, description: &str, parameters: serde_json::Value) -> ToolConfig {
        tool_config_with_timeout(name, description, parameters, 30)
    }

    /// Create a tool config with custom timeout
    pub fn tool_config_with_timeout(
        name: &str,
        description: &str,
        parameters: serde_json::Value,
        timeout_secs: u64,
    ) -> ToolConfig {
        ToolConfig {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            timeout_secs,
        }
    }

    /// Shared HTTP client builder for tools calling public APIs
    pub fn http_client(timeout_secs: u64) -> iagent_core::IagentResult<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(concat!("iagent/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                iagent_core::IagentError::tool(format!("Failed to create HTTP client: {}", e))
            })
    }
}
