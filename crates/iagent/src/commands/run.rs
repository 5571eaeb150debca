use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::config::RunSettings;
use crate::output;
use iagent_core::AgentEvent;
use iagent_runtime::Runtime;

/// Run one task to completion and print the answer
pub async fn execute(cli: Cli) -> Result<()> {
    let settings = RunSettings::from_cli(&cli)?;
    debug!(
        provider = %settings.model.provider,
        model = %settings.model.model,
        "Resolved run settings"
    );

    let model = iagent_llm::create_model(settings.model.clone())
        .context("Failed to create model")?;
    let runtime = Runtime::new(model, settings.agent.clone())?;

    output::print_mode_banner(settings.agent.execute);

    if settings.log_file.is_some() && !runtime.tool_names().iter().any(|t| t == "parse_logs") {
        warn!("--log-file is ignored unless the parse_logs tool is enabled");
    }

    let task = settings.effective_task();
    output::print_thinking();

    let result = if settings.agent.stream {
        let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                output::print_event(&event);
            }
        });
        let result = runtime.run_streaming(&task, tx).await;
        if let Err(e) = printer.await {
            warn!("Event printer stopped: {}", e);
        }
        result?
    } else {
        runtime.run(&task).await?
    };

    output::print_result(&result, settings.agent.max_steps);
    Ok(())
}
