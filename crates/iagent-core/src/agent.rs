//! Agent configuration, execution trace and run result types

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{IagentError, IagentResult, ToolResult};

/// Agent variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// Writes and (optionally) runs Python code blocks
    #[default]
    Code,
    /// Calls registered tools through `Action:` JSON
    Tool,
    /// Tool-calling agent primed for incident triage
    Triage,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Code => "code",
            AgentType::Tool => "tool",
            AgentType::Triage => "triage",
        }
    }

    /// Whether the variant interprets fenced code blocks
    pub fn runs_code(&self) -> bool {
        matches!(self, AgentType::Code)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = IagentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code" => Ok(AgentType::Code),
            "tool" => Ok(AgentType::Tool),
            "triage" => Ok(AgentType::Triage),
            other => Err(IagentError::unknown_configuration(format!(
                "Unknown agent type: {}",
                other
            ))),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent_type: AgentType,

    /// Overrides the variant's built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Tool names to enable
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Emit live events while running
    #[serde(default)]
    pub stream: bool,

    /// Run generated code instead of previewing it
    #[serde(default)]
    pub execute: bool,
}

fn default_max_steps() -> usize {
    10
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_type: AgentType::default(),
            system_prompt: None,
            tools: Vec::new(),
            max_steps: default_max_steps(),
            temperature: default_temperature(),
            max_tokens: None,
            stream: false,
            execute: false,
        }
    }
}

impl AgentConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> IagentResult<Self> {
        let config: AgentConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IagentResult<()> {
        if self.max_steps == 0 {
            return Err(IagentError::config("max_steps must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(IagentError::config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// One tool call made during a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: ToolResult,
}

/// One model/action round-trip in the trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub step_index: usize,
    pub model_output: String,
    #[serde(default)]
    pub tool_invocations: Vec<ToolInvocation>,
    #[serde(default)]
    pub observations: Vec<String>,
    pub is_final: bool,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    FinalAnswer,
    StepBudgetExhausted,
}

/// Terminal result of one agent run
#[derive(Debug, Clone, Serialize)]
pub struct AgentRunResult {
    pub answer: String,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub steps: Vec<AgentStep>,
    pub outcome: RunOutcome,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl AgentRunResult {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_final_answer(&self) -> bool {
        self.outcome == RunOutcome::FinalAnswer
    }
}

/// Live event emitted while an agent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Token fragment from the model
    Stream { content: String },
    /// Output of an executed (or previewed) code block
    CodeOutput { content: String },
    /// Observation returned by a tool
    ToolResult { tool: String, result: String },
    Error { content: String },
    Final { result: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_from_str() {
        assert_eq!("Tool".parse::<AgentType>().unwrap(), AgentType::Tool);
        assert_eq!("triage".parse::<AgentType>().unwrap(), AgentType::Triage);
        let err = "planner".parse::<AgentType>().unwrap_err();
        assert!(matches!(err, IagentError::UnknownConfiguration(_)));
        assert_eq!(err.to_string(), "Unknown configuration: Unknown agent type: planner");
    }

    #[test]
    fn test_config_defaults_from_yaml() {
        let config = AgentConfig::from_yaml("agent_type: tool\ntools: [parse_logs]\n").unwrap();
        assert_eq!(config.agent_type, AgentType::Tool);
        assert_eq!(config.max_steps, 10);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.tools, vec!["parse_logs".to_string()]);
        assert!(!config.execute);
    }

    #[test]
    fn test_config_rejects_zero_steps() {
        let err = AgentConfig::from_yaml("max_steps: 0\n").unwrap_err();
        assert!(matches!(err, IagentError::Config(_)));
    }

    #[test]
    fn test_event_serialization() {
        let event = AgentEvent::ToolResult {
            tool: "parse_logs".to_string(),
            result: "{}".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool"], "parse_logs");

        let outcome = serde_json::to_value(RunOutcome::StepBudgetExhausted).unwrap();
        assert_eq!(outcome, "step_budget_exhausted");
    }
}
