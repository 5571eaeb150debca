//! CI/CD tools backed by the GitHub Actions REST API
//!
//! - `get_cicd_status` - recent workflow runs with outcome counts
//! - `debug_cicd_failure` - failed jobs and steps of one run, plus a model diagnosis
//! - `analyze_cicd_patterns` - recurring failing workflows, jobs and steps
//!
//! The repository comes from the `repo` argument ("owner/name") or
//! `GITHUB_REPOSITORY`. `GITHUB_TOKEN` is sent when set; public repositories
//! work without it at a lower rate limit.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::common::{create_schema, tool_config_with_timeout};
use iagent_core::{
    IagentError, IagentResult, Model, ModelRequest, Tool, ToolConfig, ToolInput, ToolResult,
};

const GITHUB_API: &str = "https://api.github.com";
const DEFAULT_LIMIT: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

/// Connection settings shared by the CI/CD tools
#[derive(Debug, Clone, Default)]
pub struct GitHubSettings {
    pub api_base: String,
    pub token: Option<String>,
    pub default_repo: Option<String>,
}

impl GitHubSettings {
    pub fn from_env() -> Self {
        Self {
            api_base: GITHUB_API.to_string(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            default_repo: std::env::var("GITHUB_REPOSITORY")
                .ok()
                .filter(|r| !r.is_empty()),
        }
    }

    fn resolve_repo(&self, input: &ToolInput) -> IagentResult<Result<String, ToolResult>> {
        let repo: Option<String> = input.get_opt("repo")?;
        let repo = match repo.or_else(|| self.default_repo.clone()) {
            Some(repo) => repo,
            None => {
                return Ok(Err(ToolResult::error(
                    "No repository given: pass repo as owner/name or set GITHUB_REPOSITORY",
                )))
            }
        };
        let valid = matches!(repo.split_once('/'), Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/'));
        if !valid {
            return Ok(Err(ToolResult::error(format!(
                "Invalid repository '{}': expected owner/name",
                repo
            ))));
        }
        Ok(Ok(repo))
    }
}

/// Create GitHub API HTTP client with optional authentication
fn create_github_client(token: Option<&str>) -> IagentResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    if let Some(token) = token {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| IagentError::tool(format!("Invalid token: {}", e)))?,
        );
    }
    headers.insert(
        "X-GitHub-Api-Version",
        reqwest::header::HeaderValue::from_static("2022-11-28"),
    );
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static("iagent-cicd-tool"),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|e| IagentError::tool(format!("Failed to create HTTP client: {}", e)))
}

/// Map GitHub API error responses to tool errors
fn handle_github_error(status: u16, body: &serde_json::Value) -> ToolResult {
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error");

    match status {
        401 => ToolResult::error("Authentication failed. Check GITHUB_TOKEN."),
        403 => ToolResult::error(format!(
            "Permission denied: {}. Check token scopes or rate limits.",
            message
        )),
        404 => ToolResult::error("Repository or run not found. Check repo and run_id."),
        429 => ToolResult::error("Rate limited. Retry after cooldown period."),
        500..=599 => ToolResult::error(format!("GitHub server error: {}", message)),
        _ => ToolResult::error(format!("GitHub API error ({}): {}", status, message)),
    }
}

/// Status first: error pages from GitHub are often HTML or empty
fn decode_response<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ToolResult> {
    if status != 200 {
        let body = serde_json::from_slice(body).unwrap_or(serde_json::Value::Null);
        return Err(handle_github_error(status, &body));
    }
    serde_json::from_slice(body)
        .map_err(|e| ToolResult::error(format!("Unexpected GitHub response: {}", e)))
}

/// Thin GitHub Actions API client
struct ActionsApi {
    client: reqwest::Client,
    base: String,
}

impl ActionsApi {
    fn new(settings: &GitHubSettings, repo: &str) -> IagentResult<Self> {
        Ok(Self {
            client: create_github_client(settings.token.as_deref())?,
            base: format!("{}/repos/{}/actions", settings.api_base.trim_end_matches('/'), repo),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolResult> {
        let url = format!("{}{}", self.base, path);
        debug!(url = %url, "GitHub API request");

        let response = match self.client.get(&url).query(query).send().await {
            Ok(r) => r,
            Err(e) => {
                return Err(if e.is_timeout() {
                    ToolResult::error("Request timeout")
                } else if e.is_connect() {
                    ToolResult::error(format!("Connection failed: {}", e))
                } else {
                    ToolResult::error(format!("GitHub request failed: {}", e))
                })
            }
        };

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ToolResult::error(format!("Failed to read GitHub response: {}", e)))?;
        decode_response(status, &body)
    }

    async fn runs(&self, limit: u32, status: Option<&str>) -> Result<Vec<WorkflowRun>, ToolResult> {
        let mut query = vec![("per_page", limit.clamp(1, MAX_PER_PAGE).to_string())];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        let list: WorkflowRunList = self.get("/runs", &query).await?;
        Ok(list.workflow_runs)
    }

    async fn run(&self, run_id: u64) -> Result<WorkflowRun, ToolResult> {
        self.get(&format!("/runs/{}", run_id), &[]).await
    }

    async fn jobs(&self, run_id: u64) -> Result<Vec<Job>, ToolResult> {
        let list: JobList = self
            .get(
                &format!("/runs/{}/jobs", run_id),
                &[("per_page", MAX_PER_PAGE.to_string())],
            )
            .await?;
        Ok(list.jobs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunList {
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub head_branch: Option<String>,
    pub event: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
    pub created_at: Option<String>,
}

impl WorkflowRun {
    fn workflow(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed workflow")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStep {
    pub name: String,
    pub number: u64,
    pub conclusion: Option<String>,
}

fn is_failure(conclusion: Option<&str>) -> bool {
    matches!(conclusion, Some("failure") | Some("timed_out") | Some("startup_failure"))
}

/// Outcome counts plus a compact listing of recent runs
pub fn summarize_runs(repo: &str, runs: &[WorkflowRun]) -> serde_json::Value {
    let mut success = 0;
    let mut failure = 0;
    let mut cancelled = 0;
    let mut in_progress = 0;
    for run in runs {
        match run.conclusion.as_deref() {
            Some("success") => success += 1,
            Some("cancelled") => cancelled += 1,
            c if is_failure(c) => failure += 1,
            None => in_progress += 1,
            Some(_) => {}
        }
    }

    let listing: Vec<serde_json::Value> = runs
        .iter()
        .map(|run| {
            serde_json::json!({
                "id": run.id,
                "workflow": run.workflow(),
                "branch": run.head_branch,
                "event": run.event,
                "status": run.status,
                "conclusion": run.conclusion,
                "created_at": run.created_at,
                "url": run.html_url,
            })
        })
        .collect();

    serde_json::json!({
        "repository": repo,
        "total_runs": runs.len(),
        "success": success,
        "failure": failure,
        "cancelled": cancelled,
        "in_progress": in_progress,
        "runs": listing,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedJob {
    pub name: String,
    pub url: Option<String>,
    pub failed_steps: Vec<String>,
}

/// Facts about one failed run
#[derive(Debug, Clone, Serialize)]
pub struct FailureFacts {
    pub run_id: u64,
    pub workflow: String,
    pub branch: Option<String>,
    pub conclusion: Option<String>,
    pub url: Option<String>,
    pub failed_jobs: Vec<FailedJob>,
}

pub fn failure_facts(run: &WorkflowRun, jobs: &[Job]) -> FailureFacts {
    let failed_jobs = jobs
        .iter()
        .filter(|job| is_failure(job.conclusion.as_deref()))
        .map(|job| FailedJob {
            name: job.name.clone(),
            url: job.html_url.clone(),
            failed_steps: job
                .steps
                .iter()
                .filter(|step| is_failure(step.conclusion.as_deref()))
                .map(|step| format!("{}. {}", step.number, step.name))
                .collect(),
        })
        .collect();

    FailureFacts {
        run_id: run.id,
        workflow: run.workflow().to_string(),
        branch: run.head_branch.clone(),
        conclusion: run.conclusion.clone(),
        url: run.html_url.clone(),
        failed_jobs,
    }
}

fn ranked(counts: HashMap<String, usize>) -> Vec<serde_json::Value> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
        .into_iter()
        .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
        .collect()
}

/// Failure statistics across recent runs
pub fn failure_patterns(recent: &[WorkflowRun], failed: &[(WorkflowRun, Vec<Job>)]) -> serde_json::Value {
    let mut workflows: HashMap<String, usize> = HashMap::new();
    let mut jobs: HashMap<String, usize> = HashMap::new();
    let mut steps: HashMap<String, usize> = HashMap::new();

    for (run, run_jobs) in failed {
        *workflows.entry(run.workflow().to_string()).or_default() += 1;
        for job in run_jobs.iter().filter(|j| is_failure(j.conclusion.as_deref())) {
            *jobs.entry(job.name.clone()).or_default() += 1;
            for step in job.steps.iter().filter(|s| is_failure(s.conclusion.as_deref())) {
                *steps
                    .entry(format!("{} / {}", job.name, step.name))
                    .or_default() += 1;
            }
        }
    }

    let completed = recent.iter().filter(|r| r.conclusion.is_some()).count();
    let failures = recent
        .iter()
        .filter(|r| is_failure(r.conclusion.as_deref()))
        .count();
    let failure_rate = if completed == 0 {
        0.0
    } else {
        (failures as f64 / completed as f64 * 10000.0).round() / 100.0
    };

    serde_json::json!({
        "runs_considered": recent.len(),
        "completed_runs": completed,
        "failed_runs": failures,
        "failure_rate": failure_rate,
        "failing_workflows": ranked(workflows),
        "failing_jobs": ranked(jobs),
        "failing_steps": ranked(steps),
    })
}

fn repo_property() -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": "Repository as owner/name (defaults to GITHUB_REPOSITORY)"
    })
}

fn limit_arg(input: &ToolInput) -> IagentResult<u32> {
    Ok(input.get_opt::<u32>("limit")?.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_PER_PAGE))
}

// ============================================================================
// get_cicd_status
// ============================================================================

pub struct CicdStatusTool {
    config: ToolConfig,
    settings: GitHubSettings,
}

impl CicdStatusTool {
    pub fn new(settings: GitHubSettings) -> Self {
        let parameters = create_schema(
            serde_json::json!({
                "repo": repo_property(),
                "limit": {
                    "type": "integer",
                    "description": "Number of recent runs to inspect",
                    "default": DEFAULT_LIMIT
                }
            }),
            vec![],
        );

        Self {
            config: tool_config_with_timeout(
                "get_cicd_status",
                "Get the latest GitHub Actions workflow runs for a repository with success and \
                 failure counts.",
                parameters,
                60,
            ),
            settings,
        }
    }
}

#[async_trait]
impl Tool for CicdStatusTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let repo = match self.settings.resolve_repo(&input)? {
            Ok(repo) => repo,
            Err(result) => return Ok(result),
        };
        let limit = limit_arg(&input)?;
        debug!(repo = %repo, limit, "Fetching CI/CD status");

        let api = ActionsApi::new(&self.settings, &repo)?;
        match api.runs(limit, None).await {
            Ok(runs) => Ok(ToolResult::success(summarize_runs(&repo, &runs))),
            Err(result) => Ok(result),
        }
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}

// ============================================================================
// debug_cicd_failure
// ============================================================================

pub struct CicdDebugTool {
    config: ToolConfig,
    settings: GitHubSettings,
    model: Option<Arc<dyn Model>>,
}

impl CicdDebugTool {
    pub fn new(settings: GitHubSettings, model: Option<Arc<dyn Model>>) -> Self {
        let parameters = create_schema(
            serde_json::json!({
                "repo": repo_property(),
                "run_id": {
                    "type": "integer",
                    "description": "Workflow run ID (defaults to the latest failed run)"
                }
            }),
            vec![],
        );

        Self {
            config: tool_config_with_timeout(
                "debug_cicd_failure",
                "Debug a failed GitHub Actions run: lists failed jobs and steps and suggests a \
                 likely cause and fix.",
                parameters,
                120,
            ),
            settings,
            model,
        }
    }

    async fn diagnose(&self, facts: &FailureFacts) -> serde_json::Value {
        let model = match &self.model {
            Some(model) => model,
            None => return serde_json::Value::Null,
        };
        let prompt = match serde_json::to_string_pretty(facts) {
            Ok(json) => format!(
                "A CI/CD pipeline run failed. Facts:\n\n{}\n\nExplain the most likely root cause \
                 and the concrete steps to fix it. Be brief.",
                json
            ),
            Err(e) => return serde_json::Value::String(format!("Diagnosis unavailable: {}", e)),
        };
        let request = ModelRequest::prompt(
            Some("You are a CI/CD reliability engineer debugging GitHub Actions failures."),
            prompt,
        );
        match model.generate(&request).await {
            Ok(response) => serde_json::Value::String(response.content.trim().to_string()),
            Err(e) => {
                warn!(error = %e, "CI/CD diagnosis request failed");
                serde_json::Value::String(format!("Diagnosis unavailable: {}", e))
            }
        }
    }
}

#[async_trait]
impl Tool for CicdDebugTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let repo = match self.settings.resolve_repo(&input)? {
            Ok(repo) => repo,
            Err(result) => return Ok(result),
        };
        let run_id: Option<u64> = input.get_opt("run_id")?;
        let api = ActionsApi::new(&self.settings, &repo)?;

        let run = match run_id {
            Some(id) => match api.run(id).await {
                Ok(run) => run,
                Err(result) => return Ok(result),
            },
            None => match api.runs(1, Some("failure")).await {
                Ok(runs) => match runs.into_iter().next() {
                    Some(run) => run,
                    None => {
                        return Ok(ToolResult::text(format!(
                            "No failed workflow runs found in {}",
                            repo
                        )))
                    }
                },
                Err(result) => return Ok(result),
            },
        };

        debug!(repo = %repo, run_id = run.id, "Debugging CI/CD failure");
        let jobs = match api.jobs(run.id).await {
            Ok(jobs) => jobs,
            Err(result) => return Ok(result),
        };

        let facts = failure_facts(&run, &jobs);
        let diagnosis = self.diagnose(&facts).await;
        let mut data = serde_json::to_value(&facts)?;
        data["diagnosis"] = diagnosis;
        Ok(ToolResult::success(data))
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}

// ============================================================================
// analyze_cicd_patterns
// ============================================================================

pub struct CicdPatternTool {
    config: ToolConfig,
    settings: GitHubSettings,
}

impl CicdPatternTool {
    pub fn new(settings: GitHubSettings) -> Self {
        let parameters = create_schema(
            serde_json::json!({
                "repo": repo_property(),
                "limit": {
                    "type": "integer",
                    "description": "Number of recent runs to analyze",
                    "default": DEFAULT_LIMIT
                }
            }),
            vec![],
        );

        Self {
            config: tool_config_with_timeout(
                "analyze_cicd_patterns",
                "Find recurring CI/CD failures: failure rate and the workflows, jobs and steps \
                 that fail most often across recent GitHub Actions runs.",
                parameters,
                180,
            ),
            settings,
        }
    }
}

#[async_trait]
impl Tool for CicdPatternTool {
    async fn execute(&self, input: ToolInput) -> IagentResult<ToolResult> {
        let repo = match self.settings.resolve_repo(&input)? {
            Ok(repo) => repo,
            Err(result) => return Ok(result),
        };
        let limit = limit_arg(&input)?;
        let api = ActionsApi::new(&self.settings, &repo)?;

        let recent = match api.runs(limit, None).await {
            Ok(runs) => runs,
            Err(result) => return Ok(result),
        };

        let mut failed = Vec::new();
        for run in recent.iter().filter(|r| is_failure(r.conclusion.as_deref())) {
            match api.jobs(run.id).await {
                Ok(jobs) => failed.push((run.clone(), jobs)),
                Err(result) => return Ok(result),
            }
        }

        debug!(repo = %repo, runs = recent.len(), failed = failed.len(), "Analyzed CI/CD patterns");
        let mut data = failure_patterns(&recent, &failed);
        data["repository"] = serde_json::Value::String(repo);
        Ok(ToolResult::success(data))
    }

    fn config(&self) -> &ToolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(id: u64, name: &str, conclusion: Option<&str>) -> WorkflowRun {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "head_branch": "main",
            "status": if conclusion.is_some() { "completed" } else { "in_progress" },
            "conclusion": conclusion,
            "html_url": format!("https://github.com/acme/api/actions/runs/{}", id),
        }))
        .unwrap()
    }

    fn failed_job(name: &str, step: &str) -> Job {
        serde_json::from_value(json!({
            "id": 1,
            "name": name,
            "conclusion": "failure",
            "steps": [
                {"name": "Checkout", "number": 1, "conclusion": "success"},
                {"name": step, "number": 2, "conclusion": "failure"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_summarize_runs_counts() {
        let runs = vec![
            run(1, "CI", Some("success")),
            run(2, "CI", Some("failure")),
            run(3, "Deploy", Some("cancelled")),
            run(4, "CI", None),
            run(5, "CI", Some("timed_out")),
        ];
        let summary = summarize_runs("acme/api", &runs);
        assert_eq!(summary["total_runs"], 5);
        assert_eq!(summary["success"], 1);
        assert_eq!(summary["failure"], 2);
        assert_eq!(summary["cancelled"], 1);
        assert_eq!(summary["in_progress"], 1);
        assert_eq!(summary["runs"][2]["workflow"], "Deploy");
    }

    #[test]
    fn test_failure_facts_lists_failed_steps() {
        let passing: Job = serde_json::from_value(json!({
            "id": 2, "name": "lint", "conclusion": "success", "steps": []
        }))
        .unwrap();
        let facts = failure_facts(
            &run(9, "CI", Some("failure")),
            &[failed_job("test", "cargo test"), passing],
        );
        assert_eq!(facts.failed_jobs.len(), 1);
        assert_eq!(facts.failed_jobs[0].failed_steps, vec!["2. cargo test"]);
        assert_eq!(facts.workflow, "CI");
    }

    #[test]
    fn test_failure_patterns_ranking() {
        let recent = vec![
            run(1, "CI", Some("failure")),
            run(2, "CI", Some("failure")),
            run(3, "Deploy", Some("failure")),
            run(4, "CI", Some("success")),
            run(5, "CI", None),
        ];
        let failed = vec![
            (recent[0].clone(), vec![failed_job("test", "cargo test")]),
            (recent[1].clone(), vec![failed_job("test", "cargo test")]),
            (recent[2].clone(), vec![failed_job("push", "docker push")]),
        ];
        let patterns = failure_patterns(&recent, &failed);

        assert_eq!(patterns["completed_runs"], 4);
        assert_eq!(patterns["failed_runs"], 3);
        assert_eq!(patterns["failure_rate"], 75.0);
        assert_eq!(patterns["failing_workflows"][0], json!({"name": "CI", "count": 2}));
        assert_eq!(patterns["failing_steps"][0]["name"], "test / cargo test");
    }

    #[tokio::test]
    async fn test_missing_repository_is_tool_error() {
        let tool = CicdStatusTool::new(GitHubSettings::default());
        let result = tool.execute(ToolInput::new(json!({}))).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("GITHUB_REPOSITORY"));

        let result = tool
            .execute(ToolInput::new(json!({"repo": "not-a-repo"})))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[test]
    fn test_github_error_mapping() {
        let result = handle_github_error(404, &json!({"message": "Not Found"}));
        assert!(result.error.unwrap().contains("not found"));
        let result = handle_github_error(403, &json!({"message": "API rate limit exceeded"}));
        assert!(result.error.unwrap().contains("rate limit"));
    }

    #[test]
    fn test_non_json_error_body_uses_status() {
        let err = decode_response::<WorkflowRunList>(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(
            err.error.as_deref(),
            Some("GitHub server error: Unknown error")
        );

        let err = decode_response::<WorkflowRunList>(429, b"").unwrap_err();
        assert!(err.error.unwrap().contains("Rate limited"));

        let list: WorkflowRunList =
            decode_response(200, br#"{"total_count": 0, "workflow_runs": []}"#).unwrap();
        assert!(list.workflow_runs.is_empty());
    }
}
