use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use iagent_core::{
    AgentConfig, AgentEvent, IagentError, IagentResult, Model, ModelConfig, ModelProvider,
    ModelRequest, ModelResponse, RunOutcome, Tool, ToolConfig, ToolInput, ToolResult,
};
use iagent_runtime::{AgentLoop, CodeExecutor, LoopSettings, Runtime};
use iagent_tools::{ToolContext, ToolRegistry};

const FALLBACK_REPLY: &str = "Thought: I am still investigating.";

/// Replies from a fixed script; repeats a non-final thought once the script runs out
#[derive(Clone)]
struct ScriptedModel {
    config: ModelConfig,
    replies: Arc<Mutex<Vec<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    fn new(replies: Vec<&str>) -> Self {
        Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    fn with_results(replies: Vec<Result<String, String>>) -> Self {
        Self {
            config: ModelConfig::new(ModelProvider::OpenAI, "scripted"),
            replies: Arc::new(Mutex::new(replies)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn generate(&self, request: &ModelRequest) -> IagentResult<ModelResponse> {
        self.requests.lock().await.push(request.clone());
        let mut replies = self.replies.lock().await;
        let reply = if replies.is_empty() {
            Ok(FALLBACK_REPLY.to_string())
        } else {
            replies.remove(0)
        };
        reply
            .map(ModelResponse::text)
            .map_err(IagentError::provider)
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }
}

struct DiskUsageTool {
    config: ToolConfig,
}

impl DiskUsageTool {
    fn new() -> Self {
        Self {
            config: ToolConfig {
                name: "disk_usage".to_string(),
                description: "Report disk usage".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
                timeout_secs: 30,
            },
        }
    }
}

#[async_trait]
impl Tool for DiskUsageTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let mount: String = input.get_arg("mount")?;
        Ok(ToolResult::text(format!("{} is 97% full", mount)))
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}

fn settings(max_steps: usize) -> LoopSettings {
    LoopSettings {
        system_prompt: "You are a test agent.".to_string(),
        max_steps,
        temperature: Some(0.2),
        max_tokens: None,
    }
}

fn tool_loop(model: &ScriptedModel, max_steps: usize) -> AgentLoop {
    let mut registry = ToolRegistry::new();
    registry.register(DiskUsageTool::new());
    AgentLoop::new(Arc::new(model.clone()), settings(max_steps))
        .with_tools(Arc::new(registry.into_executor()))
}

async fn drain(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_step_budget_exhausted() {
    let model = ScriptedModel::new(vec![]);
    let result = tool_loop(&model, 3).run("Why is the disk full?").await.unwrap();

    assert_eq!(result.outcome, RunOutcome::StepBudgetExhausted);
    assert_eq!(result.step_count(), 3);
    assert!(!result.is_final_answer());
    assert_eq!(model.requests().await.len(), 3);
    assert!(result.steps.iter().all(|s| !s.is_final));
    assert!(result.steps[0].observations[0].starts_with("Error:"));
}

#[tokio::test]
async fn test_final_answer_on_first_turn() {
    let model = ScriptedModel::new(vec!["Thought: easy.\nFinal Answer: Restart nginx."]);
    let result = tool_loop(&model, 5).run("What should I do?").await.unwrap();

    assert_eq!(result.outcome, RunOutcome::FinalAnswer);
    assert_eq!(result.answer, "Restart nginx.");
    assert_eq!(result.step_count(), 1);
    assert!(result.steps[0].is_final);

    let requests = model.requests().await;
    assert_eq!(requests[0].messages[0].content, "You are a test agent.");
    assert_eq!(requests[0].messages[1].content, "What should I do?");
    assert_eq!(requests[0].stop, vec!["Observation:".to_string()]);
}

#[tokio::test]
async fn test_tool_call_then_answer() {
    let model = ScriptedModel::new(vec![
        r#"Thought: check the disk.
Action: {"name": "disk_usage", "arguments": {"mount": "/var"}}"#,
        "Final Answer: /var is nearly full; rotate the logs.",
    ]);
    let result = tool_loop(&model, 5).run("Why are writes failing?").await.unwrap();

    assert_eq!(result.outcome, RunOutcome::FinalAnswer);
    assert_eq!(result.step_count(), 2);

    let first = &result.steps[0];
    assert_eq!(first.tool_invocations.len(), 1);
    assert_eq!(first.tool_invocations[0].name, "disk_usage");
    assert!(first.tool_invocations[0].result.success);
    assert_eq!(first.observations, vec!["/var is 97% full".to_string()]);

    let requests = model.requests().await;
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.content, "Observation: /var is 97% full");
}

#[tokio::test]
async fn test_tool_errors_are_observations() {
    let model = ScriptedModel::new(vec![
        r#"Action: {"name": "kubectl", "arguments": {}}"#,
        r#"Action: {"name": "disk_usage", "arguments": {}}"#,
        "Final Answer: could not inspect the cluster",
    ]);
    let result = tool_loop(&model, 5).run("Check pods").await.unwrap();

    assert_eq!(result.outcome, RunOutcome::FinalAnswer);
    assert!(result.steps[0].observations[0].contains("Tool not found: kubectl"));
    assert!(result.steps[1].observations[0].contains("Missing argument: mount"));
    assert!(!result.steps[1].tool_invocations[0].result.success);
}

#[tokio::test]
async fn test_final_answer_tool_terminates() {
    let model = ScriptedModel::new(vec![
        r#"Action: {"name": "final_answer", "arguments": {"answer": "All healthy."}}"#,
    ]);
    let result = tool_loop(&model, 5).run("Status?").await.unwrap();

    assert_eq!(result.outcome, RunOutcome::FinalAnswer);
    assert_eq!(result.answer, "All healthy.");
    assert_eq!(result.steps[0].tool_invocations[0].name, "final_answer");
}

#[tokio::test]
async fn test_streaming_events() {
    let model = ScriptedModel::new(vec![
        r#"Action: {"name": "disk_usage", "arguments": {"mount": "/"}}"#,
        "Final Answer: done",
    ]);
    let (tx, rx) = mpsc::channel(256);
    let result = tool_loop(&model, 5)
        .run_streaming("Check the disk", tx)
        .await
        .unwrap();
    let events = drain(rx).await;

    assert_eq!(result.answer, "done");
    assert!(matches!(events.first(), Some(AgentEvent::Stream { .. })));
    assert!(events.contains(&AgentEvent::ToolResult {
        tool: "disk_usage".to_string(),
        result: "/ is 97% full".to_string(),
    }));
    assert_eq!(
        events.last(),
        Some(&AgentEvent::Final {
            result: "done".to_string()
        })
    );
}

#[tokio::test]
async fn test_no_events_without_streaming() {
    let model = ScriptedModel::new(vec!["Final Answer: done"]);
    let (tx, rx) = mpsc::channel::<AgentEvent>(16);
    drop(tx);
    tool_loop(&model, 2).run("anything").await.unwrap();
    assert!(drain(rx).await.is_empty());
}

#[tokio::test]
async fn test_provider_error_ends_run() {
    let model = ScriptedModel::with_results(vec![Err("401 Unauthorized".to_string())]);
    let (tx, rx) = mpsc::channel(16);
    let result = tool_loop(&model, 5).run_streaming("Check", tx).await;
    let events = drain(rx).await;

    assert!(matches!(result, Err(IagentError::Provider(_))));
    assert!(matches!(events.last(), Some(AgentEvent::Error { content }) if content.contains("401")));
}

#[tokio::test]
async fn test_dry_run_code_is_previewed() {
    let model = ScriptedModel::new(vec![
        "Let me check.\n```python\nprint(1)\n```",
        "Final Answer: previewed",
    ]);
    let (tx, rx) = mpsc::channel(256);
    let result = AgentLoop::new(Arc::new(model.clone()), settings(5))
        .with_code_executor(CodeExecutor::new(true))
        .run_streaming("Print one", tx)
        .await
        .unwrap();
    let events = drain(rx).await;

    assert_eq!(result.outcome, RunOutcome::FinalAnswer);
    let observation = &result.steps[0].observations[0];
    assert!(observation.contains("not executed"));
    assert!(observation.contains("print(1)"));
    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::CodeOutput { content } if content.contains("print(1)"))));
}

#[tokio::test]
async fn test_runtime_tool_variant_end_to_end() {
    let model = ScriptedModel::new(vec![
        r#"Action: {"name": "final_answer", "arguments": {"answer": "nothing to do"}}"#,
    ]);
    let config = AgentConfig {
        tools: vec!["system_monitor".to_string()],
        max_steps: 3,
        ..Default::default()
    };
    let runtime =
        Runtime::with_tool_context(Arc::new(model.clone()), config, &ToolContext::default())
            .unwrap();
    let result = runtime.run("Is the host healthy?").await.unwrap();

    assert_eq!(result.answer, "nothing to do");
    let requests = model.requests().await;
    assert!(requests[0].messages[0].content.contains("system_monitor"));
    assert!(requests[0].messages[0].content.contains("final_answer"));
}
