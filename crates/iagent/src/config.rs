//! Run settings: YAML file defaults merged with command-line flags

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use iagent_core::{AgentConfig, AgentType, ModelConfig, ModelProvider, DEFAULT_MODEL_ID};

/// Optional config file; every field is a default the CLI can override
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub model_type: Option<String>,
    pub model_id: Option<String>,
    pub endpoint: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub agent_type: Option<String>,
    pub max_steps: Option<usize>,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Fully resolved settings for one run
#[derive(Debug)]
pub struct RunSettings {
    pub task: String,
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub log_file: Option<PathBuf>,
}

impl RunSettings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Flags win over the file; the file wins over built-in defaults
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let provider: ModelProvider = cli
            .model_type
            .as_deref()
            .or(file.model_type.as_deref())
            .unwrap_or("openai")
            .parse()?;
        let agent_type: AgentType = cli
            .agent_type
            .as_deref()
            .or(file.agent_type.as_deref())
            .unwrap_or("code")
            .parse()?;

        let model_id = cli
            .model_id
            .clone()
            .or(file.model_id)
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        let defaults = AgentConfig::default();
        let agent = AgentConfig {
            agent_type,
            system_prompt: file.system_prompt,
            tools: if cli.tools.is_empty() { file.tools } else { cli.tools.clone() },
            max_steps: cli.max_steps.or(file.max_steps).unwrap_or(defaults.max_steps),
            temperature: file.temperature.unwrap_or(defaults.temperature),
            max_tokens: file.max_tokens,
            stream: cli.stream,
            execute: cli.execute,
        };
        agent.validate()?;

        let mut model = ModelConfig::new(provider, model_id);
        model.endpoint = cli.endpoint.clone().or(file.endpoint);
        model.temperature = agent.temperature;
        model.max_tokens = agent.max_tokens;
        if let Some(timeout) = file.timeout_secs {
            model.timeout_secs = timeout;
        }

        Ok(Self {
            task: cli.task.clone(),
            model,
            agent,
            log_file: cli.log_file.clone(),
        })
    }

    /// Task text sent to the agent, pointing parse_logs at the log file when both are given
    pub fn effective_task(&self) -> String {
        match &self.log_file {
            Some(path) if self.agent.tools.iter().any(|t| t == "parse_logs") => format!(
                "Use the parse_logs tool to analyze the log file: {}. {}",
                path.display(),
                self.task
            ),
            _ => self.task.clone(),
        }
    }
}
