//! delegate CLI
//!
//! Runs delegated tasks as supervised subagent processes. The same binary is
//! re-executed with `--subagent` to act as the child.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{debug, error, info};

use delegate_cli::child;
use delegate_cli::run_cmd::{self, RunArgs};
use delegate_core::config::{self, Config};
use delegate_core::tracing_init::init_tracing;
use delegate_core::SubagentManager;

#[derive(Debug, Parser)]
#[command(name = "delegate", version, about = "Delegate tasks to supervised subagent processes")]
struct Cli {
    /// Run as a subagent child (set by the supervising process)
    #[arg(long, hide = true, requires = "task")]
    subagent: bool,

    /// Task for subagent mode
    #[arg(long, hide = true, requires = "subagent", allow_hyphen_values = true)]
    task: Option<String>,

    /// Context for subagent mode
    #[arg(long, hide = true, requires = "subagent", allow_hyphen_values = true)]
    context: Option<String>,

    /// Maximum number of tracked subagents (1-20)
    #[arg(long, global = true, env = "DELEGATE_MAX_SUBAGENTS")]
    max_subagents: Option<i64>,

    /// Per-subagent timeout in seconds (1-3600)
    #[arg(long, global = true, env = "DELEGATE_SUBAGENT_TIMEOUT")]
    subagent_timeout: Option<i64>,

    /// Log level (overridden by `RUST_LOG`)
    #[arg(long, global = true, env = "DELEGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "DELEGATE_LOG_JSON")]
    log_json: bool,

    /// Project directory holding `.delegate/settings.json`
    #[arg(long, global = true, env = "DELEGATE_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run tasks as subagents and report their results
    Run(RunArgs),
}

impl Cli {
    /// Resolve configuration files, then apply command-line overrides.
    fn config(&self) -> Result<Config> {
        let project_dir = match &self.project_dir {
            Some(dir) => Some(dir.clone()),
            None => std::env::current_dir().ok(),
        };
        let mut config = config::load_config(project_dir.as_deref())?;
        if let Some(n) = self.max_subagents {
            config.subagents.max_subagents = n;
        }
        if let Some(n) = self.subagent_timeout {
            config.subagents.subagent_timeout = n;
        }
        if let Some(level) = &self.log_level {
            config.logging.log_level.clone_from(level);
        }
        if self.log_json {
            config.logging.log_json = true;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;

    if cli.subagent {
        // Anything logged here ends up in the parent's captured output.
        let level = cli.log_level.as_deref().unwrap_or("warn");
        init_tracing(level, config.logging.log_json);

        let task = cli.task.as_deref().unwrap_or_default();
        let code = match child::run_task(task, cli.context.as_deref()) {
            Ok(code) => code,
            Err(e) => {
                error!(error = %e, "Subagent task failed to run");
                1
            }
        };
        debug!(code, "Subagent exiting");
        std::process::exit(code);
    }

    init_tracing(&config.logging.log_level, config.logging.log_json);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut manager = SubagentManager::from_settings(&config.subagents);
    if child::inherited_subagent_flag() {
        manager.set_subagent_process(true);
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        max_subagents = manager.max_subagents(),
        timeout_secs = manager.timeout().as_secs(),
        nested = manager.is_subagent_process(),
        "Starting delegate"
    );

    let ok = match command {
        Commands::Run(args) => run_cmd::run(&mut manager, &args, &mut io::stdout().lock())?,
    };

    // Cleanup has to happen before `exit`, which skips destructors.
    drop(manager);
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
