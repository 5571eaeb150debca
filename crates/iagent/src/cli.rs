use clap::Parser;
use std::path::PathBuf;

/// iagent - DevOps agent for log triage, CI/CD debugging and host health
#[derive(Parser, Debug)]
#[command(name = "iagent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Task for the agent
    pub task: String,

    /// Model provider (openai, litellm, huggingface, ollama, bedrock)
    #[arg(long)]
    pub model_type: Option<String>,

    /// Model identifier
    #[arg(long, env = "IAGENT_MODEL_ID")]
    pub model_id: Option<String>,

    /// Agent variant (code, tool, triage)
    #[arg(long)]
    pub agent_type: Option<String>,

    /// Tools to enable; any tool selects the tool-calling agent
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub tools: Vec<String>,

    /// Log file for the parse_logs tool
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Maximum model/tool round-trips
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Print model output and tool results as they arrive
    #[arg(long)]
    pub stream: bool,

    /// Run generated code locally instead of previewing it
    #[arg(long)]
    pub execute: bool,

    /// Debug logging for iagent crates (RUST_LOG takes precedence)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// YAML config file providing defaults
    #[arg(long, env = "IAGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Provider endpoint override
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tools_accept_lists() {
        let cli = Cli::try_parse_from([
            "iagent",
            "check logs",
            "--tools",
            "parse_logs,web_search",
            "--stream",
        ])
        .unwrap();
        assert_eq!(cli.task, "check logs");
        assert_eq!(cli.tools, vec!["parse_logs", "web_search"]);
        assert!(cli.stream);
        assert!(!cli.execute);
    }
}
