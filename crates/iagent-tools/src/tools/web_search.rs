//! `web_search` - DuckDuckGo Instant Answer lookup

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::common::{create_schema, http_client, tool_config_with_timeout};
use iagent_core::{IagentResult, Tool, ToolConfig, ToolInput, ToolResult};

const SEARCH_URL: &str = "https://api.duckduckgo.com/";
const DEFAULT_MAX_RESULTS: usize = 5;

pub struct WebSearchTool {
    config: ToolConfig,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        let parameters = create_schema(
            serde_json::json!({
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of related topics to return",
                    "default": DEFAULT_MAX_RESULTS
                }
            }),
            vec!["query"],
        );

        Self {
            config: tool_config_with_timeout(
                "web_search",
                "Search the web for documentation, error messages and known issues. Returns a \
                 short abstract and related links.",
                parameters,
                30,
            ),
            endpoint: SEARCH_URL.to_string(),
        }
    }

    /// Point the tool at a different instant-answer endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let query: String = input.get_arg("query")?;
        let max_results: usize = input.get_opt("max_results")?.unwrap_or(DEFAULT_MAX_RESULTS);

        debug!(query = %query, "Running web search");

        let client = http_client(self.config.timeout_secs)?;
        let response = match client
            .get(&self.endpoint)
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Ok(ToolResult::error(format!("Search request failed: {}", e))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!(
                "Search API returned HTTP {}",
                status.as_u16()
            )));
        }

        let answer: InstantAnswer = match response.json().await {
            Ok(answer) => answer,
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Failed to parse search response: {}",
                    e
                )))
            }
        };

        Ok(ToolResult::text(format_answer(&query, &answer, max_results)))
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    answer: String,
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Link {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn collect_links<'a>(topics: &'a [RelatedTopic], out: &mut Vec<(&'a str, &'a str)>) {
    for topic in topics {
        match topic {
            RelatedTopic::Link { text, first_url } => out.push((text.as_str(), first_url.as_str())),
            RelatedTopic::Group { topics } => collect_links(topics, out),
        }
    }
}

fn format_answer(query: &str, answer: &InstantAnswer, max_results: usize) -> String {
    let mut out = Vec::new();
    if !answer.heading.is_empty() {
        out.push(format!("# {}", answer.heading));
    }
    if !answer.answer.is_empty() {
        out.push(format!("Answer: {}", answer.answer));
    }
    if !answer.abstract_text.is_empty() {
        out.push(answer.abstract_text.clone());
        if !answer.abstract_url.is_empty() {
            out.push(format!("Source: {}", answer.abstract_url));
        }
    }

    let mut links = Vec::new();
    collect_links(&answer.related_topics, &mut links);
    if !links.is_empty() {
        out.push("Related:".to_string());
        for (text, url) in links.into_iter().take(max_results) {
            out.push(format!("- {} ({})", text, url));
        }
    }

    if out.is_empty() {
        format!("No instant answer found for '{}'.", query)
    } else {
        out.join("\n")
    }
}
