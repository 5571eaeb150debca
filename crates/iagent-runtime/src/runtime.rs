//! Runtime - assembles an agent loop from a model and an agent configuration
//!
//! The variant policy is applied once, in [`Runtime::new`]: configured tools
//! pin the run to the tool-calling variant, which disables code blocks. Tool
//! variants always get `final_answer` in addition to the configured tools.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::executor::{AgentLoop, CodeExecutor, LoopSettings};
use crate::prompts::system_prompt;
use iagent_core::{
    AgentConfig, AgentEvent, AgentRunResult, AgentType, IagentResult, Model, ToolExecutor,
};
use iagent_tools::{ToolContext, ToolRegistry, FINAL_ANSWER_TOOL};

pub struct Runtime {
    model: Arc<dyn Model>,
    agent_type: AgentType,
    settings: LoopSettings,
    tools: Option<Arc<dyn ToolExecutor>>,
    tool_names: Vec<String>,
    execute_code: bool,
}

impl Runtime {
    /// Build a runtime; tools get the model and GitHub settings from the environment
    pub fn new(model: Arc<dyn Model>, config: AgentConfig) -> IagentResult<Self> {
        let ctx = ToolContext::new(Some(model.clone()));
        Self::with_tool_context(model, config, &ctx)
    }

    pub fn with_tool_context(
        model: Arc<dyn Model>,
        config: AgentConfig,
        ctx: &ToolContext,
    ) -> IagentResult<Self> {
        config.validate()?;

        let agent_type = effective_agent_type(&config);
        if agent_type != config.agent_type {
            info!(
                requested = %config.agent_type,
                agent_type = %agent_type,
                "Auto-selected agent type (tools detected)"
            );
        }

        let (tools, tool_names) = if agent_type.runs_code() {
            (None, Vec::new())
        } else {
            let mut names = config.tools.clone();
            if !names.iter().any(|n| n == FINAL_ANSWER_TOOL) {
                names.push(FINAL_ANSWER_TOOL.to_string());
            }
            let registry = ToolRegistry::from_names(&names, ctx)?;
            let names = registry.list_names();
            let executor: Arc<dyn ToolExecutor> = Arc::new(registry.into_executor());
            (Some(executor), names)
        };

        let prompt = match &config.system_prompt {
            Some(custom) => custom.clone(),
            None => {
                let definitions = tools
                    .as_ref()
                    .map(|t| t.list_tools())
                    .unwrap_or_default();
                system_prompt(agent_type, &definitions)
            }
        };

        info!(agent_type = %agent_type, tools = ?tool_names, "Runtime configured");

        Ok(Self {
            model,
            agent_type,
            settings: LoopSettings {
                system_prompt: prompt,
                max_steps: config.max_steps,
                temperature: Some(config.temperature),
                max_tokens: config.max_tokens,
            },
            tools,
            tool_names,
            execute_code: config.execute,
        })
    }

    /// Variant the runs will use after the tool policy
    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Enabled tool names, sorted; empty for the code variant
    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    pub fn system_prompt(&self) -> &str {
        &self.settings.system_prompt
    }

    /// Whether code blocks are run rather than previewed
    pub fn executes_code(&self) -> bool {
        self.agent_type.runs_code() && self.execute_code
    }

    /// Fresh loop for one task
    pub fn agent_loop(&self) -> AgentLoop {
        let mut agent = AgentLoop::new(self.model.clone(), self.settings.clone());
        if let Some(tools) = &self.tools {
            agent = agent.with_tools(tools.clone());
        }
        if self.agent_type.runs_code() {
            agent = agent.with_code_executor(CodeExecutor::new(!self.execute_code));
        }
        agent
    }

    pub async fn run(&self, task: &str) -> IagentResult<AgentRunResult> {
        self.agent_loop().run(task).await
    }

    pub async fn run_streaming(
        &self,
        task: &str,
        tx: mpsc::Sender<AgentEvent>,
    ) -> IagentResult<AgentRunResult> {
        self.agent_loop().run_streaming(task, tx).await
    }
}

/// Configured tools force the tool-calling variant
pub fn effective_agent_type(config: &AgentConfig) -> AgentType {
    if !config.tools.is_empty() && config.agent_type.runs_code() {
        AgentType::Tool
    } else {
        config.agent_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iagent_core::{ModelConfig, ModelProvider, ModelRequest, ModelResponse};

    struct SilentModel {
        config: ModelConfig,
    }

    #[async_trait]
    impl Model for SilentModel {
        async fn generate(&self, _request: &ModelRequest) -> IagentResult<ModelResponse> {
            Ok(ModelResponse::text("Final Answer: ok"))
        }

        fn config(&self) -> &ModelConfig {
            &self.config
        }
    }

    fn model() -> Arc<dyn Model> {
        Arc::new(SilentModel {
            config: ModelConfig::new(ModelProvider::OpenAI, "test"),
        })
    }

    #[test]
    fn test_tools_force_tool_variant() {
        let config = AgentConfig {
            tools: vec!["web_search".to_string()],
            ..Default::default()
        };
        assert_eq!(effective_agent_type(&config), AgentType::Tool);

        let runtime = Runtime::with_tool_context(model(), config, &ToolContext::default()).unwrap();
        assert_eq!(runtime.agent_type(), AgentType::Tool);
        assert_eq!(runtime.tool_names(), &["final_answer", "web_search"]);
        assert!(!runtime.executes_code());
    }

    #[test]
    fn test_triage_keeps_variant_with_tools() {
        let config = AgentConfig {
            agent_type: AgentType::Triage,
            tools: vec!["system_monitor".to_string()],
            ..Default::default()
        };
        let runtime = Runtime::with_tool_context(model(), config, &ToolContext::default()).unwrap();
        assert_eq!(runtime.agent_type(), AgentType::Triage);
        assert!(runtime.system_prompt().contains("system_monitor"));
    }

    #[test]
    fn test_code_variant_without_tools() {
        let config = AgentConfig {
            execute: true,
            ..Default::default()
        };
        let runtime = Runtime::with_tool_context(model(), config, &ToolContext::default()).unwrap();
        assert_eq!(runtime.agent_type(), AgentType::Code);
        assert!(runtime.tool_names().is_empty());
        assert!(runtime.executes_code());
    }

    #[test]
    fn test_unknown_tool_fails_before_running() {
        let config = AgentConfig {
            tools: vec!["kubectl".to_string()],
            ..Default::default()
        };
        let result = Runtime::with_tool_context(model(), config, &ToolContext::default());
        assert!(matches!(
            result.err(),
            Some(iagent_core::IagentError::UnknownConfiguration(_))
        ));
    }

    #[test]
    fn test_custom_system_prompt() {
        let config = AgentConfig {
            system_prompt: Some("Be terse.".to_string()),
            ..Default::default()
        };
        let runtime = Runtime::with_tool_context(model(), config, &ToolContext::default()).unwrap();
        assert_eq!(runtime.system_prompt(), "Be terse.");
    }
}
