//! Model-backed DevOps recommendations for a structural report

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::aggregator::{AnalysisReport, StructuralReport};
use iagent_core::{IagentResult, Model, ModelRequest};

static NUMBERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+[.)]\s").expect("valid marker regex"));

const SYSTEM_PROMPT: &str = "You are a senior DevOps and SRE engineer. You review structured \
log analysis reports and give concrete, prioritized operational recommendations.";

const EMPTY_RESPONSE: &str = "The model returned no recommendations for this analysis.";

/// Folds model recommendations into a structural report
pub struct RecommendationBridge {
    model: Option<Arc<dyn Model>>,
}

impl RecommendationBridge {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model: Some(model) }
    }

    /// Bridge that never calls a model
    pub fn disabled() -> Self {
        Self { model: None }
    }

    /// Attach recommendations, consuming the structural report
    pub async fn attach(&self, structure: StructuralReport) -> AnalysisReport {
        let recommendations = match &self.model {
            Some(model) => match self.request(model.as_ref(), &structure).await {
                Ok(text) => split_sections(&text),
                Err(e) => {
                    warn!(error = %e, "Recommendation request failed");
                    vec![format!("Recommendations unavailable: {}", e)]
                }
            },
            None => vec!["Recommendations unavailable: no model configured".to_string()],
        };
        AnalysisReport::new(structure, recommendations)
    }

    async fn request(&self, model: &dyn Model, structure: &StructuralReport) -> IagentResult<String> {
        let prompt = build_prompt(structure)?;
        debug!(prompt_len = prompt.len(), "Requesting DevOps recommendations");
        let response = model
            .generate(&ModelRequest::prompt(Some(SYSTEM_PROMPT), prompt))
            .await?;
        Ok(response.content)
    }
}

fn build_prompt(structure: &StructuralReport) -> IagentResult<String> {
    Ok(format!(
        "Here is a log analysis report in JSON:\n\n{}\n\n\
         Based on the error rates, security events and traffic trend, give 3 to 5 \
         specific, actionable recommendations for the operations team. Number each \
         recommendation and separate them with a blank line.",
        structure.to_json()?
    ))
}

/// Split a free-text response into ordered recommendation entries
pub fn split_sections(text: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                sections.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        sections.push(current.join("\n").trim().to_string());
    }

    if sections.is_empty() {
        return vec![EMPTY_RESPONSE.to_string()];
    }

    if sections.len() == 1 {
        let only = &sections[0];
        let starts: Vec<usize> = NUMBERED_MARKER.find_iter(only).map(|m| m.start()).collect();
        if !starts.is_empty() {
            let mut split = Vec::new();
            let preamble = only[..starts[0]].trim();
            if !preamble.is_empty() {
                split.push(preamble.to_string());
            }
            for (i, start) in starts.iter().enumerate() {
                let end = starts.get(i + 1).copied().unwrap_or(only.len());
                let item = only[*start..end].trim();
                if !item.is_empty() {
                    split.push(item.to_string());
                }
            }
            return split;
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisAggregator, LogFormat, LogWindowExtractor};
    use async_trait::async_trait;
    use iagent_core::{IagentError, ModelConfig, ModelProvider, ModelResponse};

    struct FixedModel {
        config: ModelConfig,
        reply: Result<String, String>,
    }

    impl FixedModel {
        fn new(reply: Result<&str, &str>) -> Arc<dyn Model> {
            Arc::new(Self {
                config: ModelConfig::new(ModelProvider::OpenAI, "test"),
                reply: reply.map(str::to_string).map_err(str::to_string),
            })
        }
    }

    #[async_trait]
    impl Model for FixedModel {
        async fn generate(&self, _request: &ModelRequest) -> IagentResult<ModelResponse> {
            match &self.reply {
                Ok(text) => Ok(ModelResponse::text(text.clone())),
                Err(e) => Err(IagentError::provider(e.clone())),
            }
        }

        fn config(&self) -> &ModelConfig {
            &self.config
        }
    }

    fn structure() -> StructuralReport {
        let log = r#"10.0.0.1 - - [01/Mar/2024:10:00:00 +0000] "GET /.env HTTP/1.1" 404 0 "-" "sqlmap/1.7""#;
        AnalysisAggregator::new(LogWindowExtractor::new(LogFormat::Nginx, 60).unwrap())
            .analyze(log)
            .unwrap()
    }

    #[test]
    fn test_split_on_blank_lines() {
        let sections = split_sections("First point.\nstill first\n\n\n  Second point.  \n");
        assert_eq!(sections, vec!["First point.\nstill first", "Second point."]);
    }

    #[test]
    fn test_split_on_numbered_markers() {
        let text = "Recommendations:\n1. Block 10.0.0.1\n2) Rotate credentials\n   for the admin user\n3. Add rate limiting";
        let sections = split_sections(text);
        assert_eq!(
            sections,
            vec![
                "Recommendations:",
                "1. Block 10.0.0.1",
                "2) Rotate credentials\n   for the admin user",
                "3. Add rate limiting",
            ]
        );
    }

    #[test]
    fn test_empty_response_gives_single_entry() {
        assert_eq!(split_sections("  \n\n"), vec![EMPTY_RESPONSE.to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_structure() {
        let original = structure();
        let bridge = RecommendationBridge::new(FixedModel::new(Err("rate limited")));
        let report = bridge.attach(original.clone()).await;

        assert_eq!(report.structure(), &original);
        assert_eq!(report.recommendations().len(), 1);
        assert!(report.recommendations()[0].starts_with("Recommendations unavailable"));
        assert!(report.recommendations()[0].contains("rate limited"));
    }

    #[tokio::test]
    async fn test_recommendations_attached_in_order() {
        let bridge =
            RecommendationBridge::new(FixedModel::new(Ok("1. Block the scanner\n\n2. Hide .env")));
        let report = bridge.attach(structure()).await;
        assert_eq!(
            report.recommendations(),
            &["1. Block the scanner".to_string(), "2. Hide .env".to_string()]
        );
    }

    #[tokio::test]
    async fn test_disabled_bridge() {
        let report = RecommendationBridge::disabled().attach(structure()).await;
        assert_eq!(report.recommendations().len(), 1);
    }
}
