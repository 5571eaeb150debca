//! Built-in system prompts, one per agent variant

use iagent_core::{AgentType, ToolDefinition};

const CODE_PROMPT: &str = "\
You are iagent, a DevOps assistant that solves tasks by writing Python.

Work in steps. In each reply, think briefly, then either:
- write one Python code block:
```python
# your code
```
  You will get its output back as an Observation. Only these modules can be
  imported: math, json, re, datetime, collections, statistics, itertools,
  random, time, string, functools. The value of a trailing expression is
  reported as its repr.
- or finish with a line starting with 'Final Answer:' followed by the answer.

Never write an Observation yourself.";

const TOOL_PROTOCOL: &str = "\
Work in steps. In each reply, think briefly, then either call exactly one tool:

Thought: <what you need and why>
Action: {\"name\": \"<tool name>\", \"arguments\": {<arguments as JSON>}}

You will get the tool output back as an Observation. When you know the answer,
call the final_answer tool or reply with a line starting with 'Final Answer:'.
Never write an Observation yourself.";

const TOOL_ROLE: &str = "\
You are iagent, a DevOps assistant that answers operational questions by \
calling tools.";

const TRIAGE_ROLE: &str = "\
You are iagent, an on-call incident triage assistant. Establish what is \
broken, how severe it is (critical, high, medium or low), the most likely \
cause, and the immediate next steps. Gather evidence with the tools before \
concluding, and structure the final answer as a numbered list: severity, \
impact, probable cause, next steps.";

/// System prompt for `agent_type`, listing `tools` for the tool-calling variants
pub fn system_prompt(agent_type: AgentType, tools: &[ToolDefinition]) -> String {
    let role = match agent_type {
        AgentType::Code => return CODE_PROMPT.to_string(),
        AgentType::Tool => TOOL_ROLE,
        AgentType::Triage => TRIAGE_ROLE,
    };

    let mut prompt = format!("{}\n\nAvailable tools:\n", role);
    for tool in tools {
        prompt.push_str(&format!(
            "- {}: {}\n  arguments schema: {}\n",
            tool.name, tool.description, tool.parameters
        ));
    }
    prompt.push('\n');
    prompt.push_str(TOOL_PROTOCOL);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_prompt_lists_tools() {
        let tools = vec![ToolDefinition {
            name: "parse_logs".to_string(),
            description: "Analyze a log file".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let prompt = system_prompt(AgentType::Tool, &tools);
        assert!(prompt.contains("- parse_logs: Analyze a log file"));
        assert!(prompt.contains("Action: {"));

        let triage = system_prompt(AgentType::Triage, &tools);
        assert!(triage.contains("triage"));
        assert!(triage.contains("parse_logs"));
    }

    #[test]
    fn test_code_prompt_ignores_tools() {
        let prompt = system_prompt(AgentType::Code, &[]);
        assert!(prompt.contains("```python"));
        assert!(prompt.contains("Final Answer:"));
    }
}
