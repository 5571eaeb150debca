//! `parse_logs` - windowed log analysis
//!
//! Reads a log file, runs the analysis pipeline and returns the report as
//! JSON text. Recommendations come from the attached model when there is one.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::common::{create_schema, tool_config_with_timeout};
use crate::analysis::{AnalysisAggregator, LogFormat, LogWindowExtractor, RecommendationBridge};
use iagent_core::{IagentError, IagentResult, Model, Tool, ToolConfig, ToolInput, ToolResult};

pub const DEFAULT_WINDOW_MINUTES: u64 = 60;
pub const DEFAULT_LOG_TYPE: &str = "nginx";

pub struct ParseLogsTool {
    config: ToolConfig,
    model: Option<Arc<dyn Model>>,
    reference_year: Option<i32>,
}

impl ParseLogsTool {
    pub fn new(model: Option<Arc<dyn Model>>) -> Self {
        let parameters = create_schema(
            serde_json::json!({
                "file_path": {
                    "type": "string",
                    "description": "Path to the log file to analyze"
                },
                "window_minutes": {
                    "type": "integer",
                    "description": "Trailing window to analyze, ending at the newest log entry",
                    "default": DEFAULT_WINDOW_MINUTES
                },
                "log_type": {
                    "type": "string",
                    "enum": ["nginx", "syslog", "generic"],
                    "description": "Log format",
                    "default": DEFAULT_LOG_TYPE
                }
            }),
            vec!["file_path"],
        );

        Self {
            config: tool_config_with_timeout(
                "parse_logs",
                "Analyze a log file over a trailing time window. Returns JSON with summary, \
                 analysis_window, error_analysis, security_analysis, performance_analysis and \
                 devops_recommendations.",
                parameters,
                120,
            ),
            model,
            reference_year: None,
        }
    }

    /// Fix the year assumed for syslog timestamps
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// Run the pipeline on log text already in memory
    pub async fn analyze_text(
        &self,
        text: &str,
        window_minutes: u64,
        log_type: &str,
    ) -> IagentResult<String> {
        let format: LogFormat = log_type.parse()?;
        let mut extractor = LogWindowExtractor::new(format, window_minutes)?;
        if let Some(year) = self.reference_year {
            extractor = extractor.with_reference_year(year);
        }

        let structure = AnalysisAggregator::new(extractor).analyze(text)?;
        let bridge = match &self.model {
            Some(model) => RecommendationBridge::new(model.clone()),
            None => RecommendationBridge::disabled(),
        };
        bridge.attach(structure).await.to_json()
    }
}

#[async_trait]
impl Tool for ParseLogsTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let file_path: String = input.get_arg("file_path")?;
        let window_minutes: u64 = input
            .get_opt("window_minutes")?
            .unwrap_or(DEFAULT_WINDOW_MINUTES);
        let log_type: String = input
            .get_opt("log_type")?
            .unwrap_or_else(|| DEFAULT_LOG_TYPE.to_string());

        debug!(file = %file_path, window_minutes, log_type = %log_type, "Parsing log file");

        // Undecodable bytes become U+FFFD; such lines fail to parse and are tallied
        let text = match tokio::fs::read(&file_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Failed to read log file {}: {}",
                    file_path, e
                )))
            }
        };

        match self.analyze_text(&text, window_minutes, &log_type).await {
            Ok(json) => Ok(ToolResult::text(json)),
            Err(e @ (IagentError::NoValidLogLines { .. } | IagentError::InvalidArgument(_))) => {
                warn!(file = %file_path, error = %e, "Log analysis failed");
                Ok(ToolResult::error(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}
