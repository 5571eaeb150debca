//! Agent Loop - bounded model/action cycle for one task
//!
//! Each step sends the conversation so far to the model and interprets the
//! reply as a tool call, a code block or a final answer. Observations are
//! appended to the conversation until the model answers or the step budget
//! runs out.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::code_executor::CodeExecutor;
use super::parser::{parse_action, Action};
use iagent_core::{
    AgentEvent, AgentRunResult, AgentStep, IagentResult, Model, ModelRequest, RequestMessage,
    RunOutcome, StreamChunk, ToolCall, ToolExecutor, ToolInput, ToolInvocation, ToolResult,
};
use iagent_tools::FINAL_ANSWER_TOOL;

const OBSERVATION_PREFIX: &str = "Observation:";

/// Per-run settings of the loop
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub system_prompt: String,
    pub max_steps: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

enum LoopState {
    Ready,
    AwaitingModel,
    ExecutingTool { step: AgentStep, call: ToolCall },
    ExecutingCode { step: AgentStep, code: String },
    Terminal { outcome: RunOutcome, answer: String },
}

/// One-shot agent loop; `run` consumes it
pub struct AgentLoop {
    model: Arc<dyn Model>,
    tools: Option<Arc<dyn ToolExecutor>>,
    code_executor: Option<CodeExecutor>,
    settings: LoopSettings,
    events: Option<mpsc::Sender<AgentEvent>>,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn Model>, settings: LoopSettings) -> Self {
        Self {
            model,
            tools: None,
            code_executor: None,
            settings,
            events: None,
        }
    }

    /// Enable tool calls
    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Enable fenced code blocks
    pub fn with_code_executor(mut self, executor: CodeExecutor) -> Self {
        self.code_executor = Some(executor);
        self
    }

    /// Run the task without emitting events
    pub async fn run(self, task: &str) -> IagentResult<AgentRunResult> {
        self.execute(task).await
    }

    /// Run the task, streaming model tokens and step events to `tx`
    pub async fn run_streaming(
        mut self,
        task: &str,
        tx: mpsc::Sender<AgentEvent>,
    ) -> IagentResult<AgentRunResult> {
        self.events = Some(tx);
        self.execute(task).await
    }

    async fn execute(self, task: &str) -> IagentResult<AgentRunResult> {
        let started = Instant::now();
        let max_steps = self.settings.max_steps.max(1);
        let allow_code = self.code_executor.is_some();

        info!(max_steps, allow_code, tools = self.tools.is_some(), "Agent run started");

        let mut messages = vec![
            RequestMessage::system(self.settings.system_prompt.clone()),
            RequestMessage::user(task),
        ];
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut state = LoopState::Ready;

        let (outcome, answer) = loop {
            state = match state {
                LoopState::Ready => {
                    if steps.len() >= max_steps {
                        warn!(max_steps, "Step budget exhausted without a final answer");
                        LoopState::Terminal {
                            outcome: RunOutcome::StepBudgetExhausted,
                            answer: exhausted_answer(&steps, max_steps),
                        }
                    } else {
                        LoopState::AwaitingModel
                    }
                }

                LoopState::AwaitingModel => {
                    let output = match self.call_model(&messages).await {
                        Ok(output) => output,
                        Err(e) => {
                            warn!(error = %e, "Model call failed");
                            self.emit(AgentEvent::Error {
                                content: e.to_string(),
                            })
                            .await;
                            return Err(e);
                        }
                    };
                    messages.push(RequestMessage::assistant(output.clone()));

                    let mut step = AgentStep {
                        step_index: steps.len() + 1,
                        model_output: output.clone(),
                        tool_invocations: Vec::new(),
                        observations: Vec::new(),
                        is_final: false,
                    };
                    debug!(step = step.step_index, "Model turn received");

                    match parse_action(&output, allow_code) {
                        Action::FinalAnswer(answer) => {
                            step.is_final = true;
                            steps.push(step);
                            LoopState::Terminal {
                                outcome: RunOutcome::FinalAnswer,
                                answer,
                            }
                        }
                        Action::ToolCall(call) if call.name == FINAL_ANSWER_TOOL => {
                            match final_answer_argument(&call) {
                                Some(answer) => {
                                    step.tool_invocations.push(ToolInvocation {
                                        name: call.name,
                                        arguments: call.arguments,
                                        result: ToolResult::text(answer.clone()),
                                    });
                                    step.is_final = true;
                                    steps.push(step);
                                    LoopState::Terminal {
                                        outcome: RunOutcome::FinalAnswer,
                                        answer,
                                    }
                                }
                                None => {
                                    let observation =
                                        "Error: final_answer requires an 'answer' argument"
                                            .to_string();
                                    self.emit_error(&observation).await;
                                    self.observe(&mut messages, &mut step, observation);
                                    steps.push(step);
                                    LoopState::Ready
                                }
                            }
                        }
                        Action::ToolCall(call) => LoopState::ExecutingTool { step, call },
                        Action::Code(code) if allow_code => LoopState::ExecutingCode { step, code },
                        Action::Code(_) => {
                            let observation =
                                "Error: code execution is disabled for this agent".to_string();
                            self.emit_error(&observation).await;
                            self.observe(&mut messages, &mut step, observation);
                            steps.push(step);
                            LoopState::Ready
                        }
                        Action::Unrecognized(reason) => {
                            let observation = format!("Error: {}", reason);
                            self.emit_error(&observation).await;
                            self.observe(&mut messages, &mut step, observation);
                            steps.push(step);
                            LoopState::Ready
                        }
                    }
                }

                LoopState::ExecutingTool { mut step, call } => {
                    let result = self.call_tool(&call).await;
                    let observation = result.to_observation();
                    self.emit(AgentEvent::ToolResult {
                        tool: call.name.clone(),
                        result: observation.clone(),
                    })
                    .await;
                    step.tool_invocations.push(ToolInvocation {
                        name: call.name,
                        arguments: call.arguments,
                        result,
                    });
                    self.observe(&mut messages, &mut step, observation);
                    steps.push(step);
                    LoopState::Ready
                }

                LoopState::ExecutingCode { mut step, code } => {
                    let observation = match &self.code_executor {
                        Some(executor) => executor.execute(&code).await.to_observation(),
                        None => "Error: code execution is disabled for this agent".to_string(),
                    };
                    self.emit(AgentEvent::CodeOutput {
                        content: observation.clone(),
                    })
                    .await;
                    self.observe(&mut messages, &mut step, observation);
                    steps.push(step);
                    LoopState::Ready
                }

                LoopState::Terminal { outcome, answer } => break (outcome, answer),
            };
        };

        let result = AgentRunResult {
            answer,
            duration: started.elapsed(),
            steps,
            outcome,
        };
        info!(
            steps = result.step_count(),
            outcome = ?result.outcome,
            duration_ms = result.duration.as_millis() as u64,
            "Agent run finished"
        );
        self.emit(AgentEvent::Final {
            result: result.answer.clone(),
        })
        .await;
        Ok(result)
    }

    fn request(&self, messages: &[RequestMessage]) -> ModelRequest {
        let mut request = ModelRequest::new(messages.to_vec());
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        request.stop = vec![OBSERVATION_PREFIX.to_string()];
        request
    }

    async fn call_model(&self, messages: &[RequestMessage]) -> IagentResult<String> {
        let request = self.request(messages);

        if self.events.is_none() {
            return Ok(self.model.generate(&request).await?.content);
        }

        let mut stream = self.model.generate_stream(&request).await?;
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::ContentDelta { delta } => {
                    self.emit(AgentEvent::Stream {
                        content: delta.clone(),
                    })
                    .await;
                    output.push_str(&delta);
                }
                StreamChunk::Done { .. } => break,
            }
        }
        Ok(output)
    }

    async fn call_tool(&self, call: &ToolCall) -> ToolResult {
        let tools = match &self.tools {
            Some(tools) => tools,
            None => {
                return ToolResult::error(format!(
                    "Tool not found: {} (no tools are enabled)",
                    call.name
                ))
            }
        };

        debug!(tool = %call.name, "Agent requested tool execution");
        match tools
            .execute_tool(&call.name, ToolInput::new(call.arguments.clone()))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    fn observe(&self, messages: &mut Vec<RequestMessage>, step: &mut AgentStep, observation: String) {
        messages.push(RequestMessage::user(format!(
            "{} {}",
            OBSERVATION_PREFIX, observation
        )));
        step.observations.push(observation);
    }

    async fn emit_error(&self, observation: &str) {
        self.emit(AgentEvent::Error {
            content: observation.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: AgentEvent) {
        if let Some(ref tx) = self.events {
            if tx.send(event).await.is_err() {
                warn!("Failed to send agent event");
            }
        }
    }
}

fn final_answer_argument(call: &ToolCall) -> Option<String> {
    match call.arguments.get("answer")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn exhausted_answer(steps: &[AgentStep], max_steps: usize) -> String {
    let last = steps
        .iter()
        .rev()
        .map(|step| step.model_output.trim())
        .find(|output| !output.is_empty());
    match last {
        Some(output) => output.to_string(),
        None => format!("No final answer after {} steps.", max_steps),
    }
}
