use std::path::PathBuf;

use clap::Parser;

/// Screenshot-driven desktop agent. Every action is shown to the operator
/// for approval before it touches the mouse or keyboard.
#[derive(Debug, Parser)]
#[command(name = "deskpilot", version, about)]
pub struct Cli {
    /// Path to config.toml. Defaults to the executable directory, then the
    /// working directory, then the user config directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Task for the agent. Asked for interactively when omitted.
    #[arg(long, value_name = "TEXT")]
    pub task: Option<String>,

    /// Overrides `agent.max_steps` from the config file.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_steps: Option<u32>,
}
