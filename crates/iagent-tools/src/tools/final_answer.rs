//! `final_answer` - ends the run with the given answer

use async_trait::async_trait;

use super::common::{create_schema, tool_config};
use iagent_core::{IagentResult, Tool, ToolConfig, ToolInput, ToolResult};

pub const FINAL_ANSWER_TOOL: &str = "final_answer";

pub struct FinalAnswerTool {
    config: ToolConfig,
}

impl FinalAnswerTool {
    pub fn new() -> Self {
        let parameters = create_schema(
            serde_json::json!({
                "answer": {
                    "type": "string",
                    "description": "The final answer to the task"
                }
            }),
            vec!["answer"],
        );

        Self {
            config: tool_config(
                FINAL_ANSWER_TOOL,
                "Provide the final answer to the task. Call this once you have everything \
                 you need; the run ends here.",
                parameters,
            ),
        }
    }
}

impl Default for FinalAnswerTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FinalAnswerTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let answer: serde_json::Value = input.get_arg("answer")?;
        Ok(match answer {
            serde_json::Value::String(text) => ToolResult::text(text),
            other => ToolResult::text(other.to_string()),
        })
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_answer_text() {
        let result = FinalAnswerTool::new()
            .execute(ToolInput::new(serde_json::json!({"answer": "Disk /var is full"})))
            .await
            .unwrap();
        assert_eq!(result.to_observation(), "Disk /var is full");
    }

    #[tokio::test]
    async fn test_non_string_answer_is_rendered() {
        let result = FinalAnswerTool::new()
            .execute(ToolInput::new(serde_json::json!({"answer": 42})))
            .await
            .unwrap();
        assert_eq!(result.to_observation(), "42");
    }
}
