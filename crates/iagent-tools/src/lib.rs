//! iagent Tools - log analysis engine and built-in agent tools
//!
//! The [`analysis`] module holds the windowed log analysis pipeline behind the
//! `parse_logs` tool. The [`tools`] module holds every built-in tool, and the
//! [`registry`] builds them by name.
//!
//! # Example
//!
//! ```rust,ignore
//! use iagent_tools::{ToolContext, ToolRegistry};
//!
//! let ctx = ToolContext::new(Some(model.clone()));
//! let registry = ToolRegistry::from_names(&["parse_logs", "final_answer"], &ctx)?;
//! let executor = registry.into_executor();
//! ```

pub mod analysis;
pub mod registry;
pub mod tools;

pub use registry::{builtin_tool_names, create_tool, BuiltinToolExecutor, ToolContext, ToolRegistry};

pub use tools::cicd::{CicdDebugTool, CicdPatternTool, CicdStatusTool, GitHubSettings};
pub use tools::final_answer::{FinalAnswerTool, FINAL_ANSWER_TOOL};
pub use tools::parse_logs::ParseLogsTool;
pub use tools::system_monitor::SystemMonitorTool;
pub use tools::web_search::WebSearchTool;

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::registry::{BuiltinToolExecutor, ToolContext, ToolRegistry};
    pub use iagent_core::{Tool, ToolConfig, ToolDefinition, ToolExecutor, ToolInput, ToolResult};
}
