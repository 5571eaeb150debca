//! Tool Registry - name-based construction, lookup and execution of tools
//!
//! Built-in tools are created from a static name -> constructor table. A
//! [`ToolRegistry`] holds the instantiated tools; a [`BuiltinToolExecutor`]
//! dispatches calls to them by name.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::tools::cicd::{CicdDebugTool, CicdPatternTool, CicdStatusTool, GitHubSettings};
use crate::tools::final_answer::FinalAnswerTool;
use crate::tools::parse_logs::ParseLogsTool;
use crate::tools::system_monitor::SystemMonitorTool;
use crate::tools::web_search::WebSearchTool;
use iagent_core::{
    IagentError, IagentResult, Model, Tool, ToolDefinition, ToolExecutor, ToolInput, ToolResult,
};

/// Shared dependencies handed to tool constructors
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Model used by tools that ask for a second opinion (log recommendations, CI/CD diagnosis)
    pub model: Option<Arc<dyn Model>>,
    pub github: GitHubSettings,
}

impl ToolContext {
    /// Context with the given model and GitHub settings read from the environment
    pub fn new(model: Option<Arc<dyn Model>>) -> Self {
        Self {
            model,
            github: GitHubSettings::from_env(),
        }
    }
}

type ToolConstructor = fn(&ToolContext) -> Arc<dyn Tool>;

fn web_search(_: &ToolContext) -> Arc<dyn Tool> {
    Arc::new(WebSearchTool::new())
}

fn parse_logs(ctx: &ToolContext) -> Arc<dyn Tool> {
    Arc::new(ParseLogsTool::new(ctx.model.clone()))
}

fn system_monitor(_: &ToolContext) -> Arc<dyn Tool> {
    Arc::new(SystemMonitorTool::new())
}

fn cicd_status(ctx: &ToolContext) -> Arc<dyn Tool> {
    Arc::new(CicdStatusTool::new(ctx.github.clone()))
}

fn cicd_debug(ctx: &ToolContext) -> Arc<dyn Tool> {
    Arc::new(CicdDebugTool::new(ctx.github.clone(), ctx.model.clone()))
}

fn cicd_patterns(ctx: &ToolContext) -> Arc<dyn Tool> {
    Arc::new(CicdPatternTool::new(ctx.github.clone()))
}

fn final_answer(_: &ToolContext) -> Arc<dyn Tool> {
    Arc::new(FinalAnswerTool::new())
}

static BUILTIN_TOOLS: &[(&str, ToolConstructor)] = &[
    ("web_search", web_search),
    ("parse_logs", parse_logs),
    ("system_monitor", system_monitor),
    ("get_cicd_status", cicd_status),
    ("debug_cicd_failure", cicd_debug),
    ("analyze_cicd_patterns", cicd_patterns),
    ("final_answer", final_answer),
];

/// Names of every built-in tool, in table order
pub fn builtin_tool_names() -> Vec<&'static str> {
    BUILTIN_TOOLS.iter().map(|(name, _)| *name).collect()
}

/// Instantiate a built-in tool by name
pub fn create_tool(name: &str, ctx: &ToolContext) -> IagentResult<Arc<dyn Tool>> {
    BUILTIN_TOOLS
        .iter()
        .find(|(tool_name, _)| *tool_name == name)
        .map(|(_, constructor)| constructor(ctx))
        .ok_or_else(|| {
            IagentError::unknown_configuration(format!(
                "Unknown tool: {} (available: {})",
                name,
                builtin_tool_names().join(", ")
            ))
        })
}

/// Tool registry for managing available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from tool names; duplicates collapse to one instance
    pub fn from_names<S: AsRef<str>>(names: &[S], ctx: &ToolContext) -> IagentResult<Self> {
        let mut registry = Self::new();
        for name in names {
            registry.register_arc(create_tool(name.as_ref(), ctx)?);
        }
        Ok(registry)
    }

    /// Register a single tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tool names, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// List tool definitions, sorted by name
    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get tool count
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Convert registry into a tool executor
    pub fn into_executor(self) -> BuiltinToolExecutor {
        BuiltinToolExecutor::new(self)
    }
}

/// Built-in tool executor that wraps the registry
pub struct BuiltinToolExecutor {
    registry: ToolRegistry,
}

impl BuiltinToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolExecutor for BuiltinToolExecutor {
    async fn execute_tool(&self, name: &str, input: ToolInput) -> IagentResult<ToolResult> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| IagentError::tool(format!("Tool not found: {}", name)))?;

        debug!(tool = %name, "Executing built-in tool");
        let start = std::time::Instant::now();

        match tool.execute(input).await {
            Ok(result) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(tool = %name, elapsed_ms = %elapsed, success = %result.success, "Tool execution complete");
                Ok(result.with_execution_time(elapsed))
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                Err(e)
            }
        }
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry.list_definitions()
    }

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }
}
