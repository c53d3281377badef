pub mod agent_engine;
pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod process;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::engine::{AgentEngine, EngineParts, LoopSettings};
use crate::agent_engine::history::RunRecord;
use crate::cli::Cli;
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::executor::approval::ConsoleOperator;
use crate::executor::dispatcher::{ActionExecutor, ExecutorTiming};
use crate::executor::input::input_backend;
use crate::llm::registry::{ProviderRegistry, Role};
use crate::llm::tools::load_system_prompt;
use crate::perception::grounding::GroundingResolver;
use crate::perception::screenshot::capture_backend;
use crate::perception::types::ScreenSize;

/// Loads configuration, confirms the safety notice with the operator and runs
/// one task to completion.
pub async fn run(cli: Cli) -> DeskPilotResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(max_steps) = cli.max_steps {
        config.agent.max_steps = max_steps;
    }

    let system_prompt =
        load_system_prompt(&config.prompts.system_template, &config.prompts.tools_dir)?;
    let warning = std::fs::read_to_string(&config.prompts.warning_file).map_err(|e| {
        DeskPilotError::Prompt(format!(
            "cannot read {}: {e}",
            config.prompts.warning_file.display()
        ))
    })?;

    let operator = Arc::new(ConsoleOperator::stdio(config.agent.accept_token.clone()));
    if !operator.acknowledge_warning(&warning)? {
        return Err(DeskPilotError::Cancelled);
    }
    let task = match cli.task {
        Some(task) if !task.trim().is_empty() => task,
        _ => operator.ask_task()?,
    };

    let registry = ProviderRegistry::from_config(&config);
    let (reasoning, reasoning_cfg) = registry.call_config_for_role(Role::Reasoning)?;
    let (grounding, grounding_cfg) = registry.call_config_for_role(Role::Grounding)?;

    let screen = ScreenSize::from(config.screen);
    let executor = ActionExecutor::new(
        Arc::from(input_backend(config.input.backend)),
        GroundingResolver::new(grounding, grounding_cfg, screen),
        operator.clone(),
        ExecutorTiming::from_config(&config.agent),
    );
    let record = RunRecord::create(&config.agent.runs_dir)?;

    let mut engine = AgentEngine::new(
        task,
        system_prompt,
        record,
        LoopSettings {
            max_steps: config.agent.max_steps,
            iteration_delay: Duration::from_millis(config.agent.iteration_delay_ms),
        },
        EngineParts {
            reasoning,
            reasoning_cfg,
            capture: Arc::from(capture_backend(config.capture.backend)),
            operator,
            executor,
            screen,
        },
    );

    let reason = engine.run().await;
    println!("\nRun finished: {reason}");
    println!("Run record: {}", engine.record().history_path().display());
    Ok(())
}
