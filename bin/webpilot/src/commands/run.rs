//! `webpilot run`: execute one automation task from the command line.

use anyhow::{bail, Context};
use std::path::Path;
use tracing::info;

use webpilot_agent::{load_context_file, run_task, BrowserExecutor};
use webpilot_core::{Config, RunOutcome};
use webpilot_oracle::create_oracle;

pub async fn run(
    config_path: &Path,
    query: &str,
    context_path: Option<&Path>,
    headed: bool,
) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        bail!("Task query must not be empty");
    }

    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.browser.headed = config.browser.headed || headed;

    let api_key = config
        .resolve_api_key()
        .unwrap_or_default();
    let oracle = create_oracle(&config.agent, &api_key)?;

    let context = match context_path {
        Some(path) => load_context_file(path)?,
        None => Vec::new(),
    };

    info!(query = query, context_events = context.len(), "Starting task");

    let mut executor = BrowserExecutor::new(config.clone(), context.clone());
    let outcome = run_task(oracle.as_ref(), &mut executor, &config.agent, query, &context).await?;

    match outcome {
        RunOutcome::Completed { answer, turns } => {
            println!("{}", answer);
            info!(turns, "Run completed");
        }
        RunOutcome::CeilingExceeded { turns } => {
            eprintln!(
                "Run terminated: turn ceiling of {} reached without a terminal answer.",
                turns
            );
            std::process::exit(2);
        }
    }
    Ok(())
}
