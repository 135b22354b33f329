// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Repo Expert main entry point - CLI and server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::sync::watch;

use repo_expert::config::{self, CliOptions, ResolvedConfig};
use repo_expert::invoker::ClaudeCodeInvoker;
use repo_expert::server::{self, AgentCard, AppState};
use repo_expert::telemetry::{init_telemetry, TaskId, TelemetryConfig};
use repo_expert::trace::{init_log_dir, init_log_dirs, FileTraceSink, AGENT_LOG_SUFFIX};
use repo_expert::workflow::{WorkflowEngine, WorkflowStatus};
use repo_expert::{Result, WorkflowError, VERSION};

/// Repo Expert - answers questions about a repository.
#[derive(Parser)]
#[command(name = "repo-expert")]
#[command(author, version, about = "Answers questions about a repository with a generate/validate loop", long_about = None)]
struct Cli {
    /// Agent executable to invoke
    #[arg(long, env = "REPO_EXPERT_AGENT", global = true)]
    agent: Option<String>,

    /// Maximum generator rounds per question
    #[arg(long, global = true)]
    max_iterations: Option<u32>,

    /// Maximum agent turns per invocation
    #[arg(long, global = true)]
    max_turns: Option<u32>,

    /// Timeout per invocation in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Directory for per-task logs (default: ./tmp/logs)
    #[arg(long, env = "REPO_EXPERT_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for `ask`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Subcommands for repo-expert.
#[derive(Subcommand)]
enum Commands {
    /// Run the A2A JSON-RPC server
    Serve {
        /// Host to bind
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port to bind
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Ask one question about a repository and print the answer
    Ask {
        /// The question to answer
        question: String,

        /// Path to the repository
        #[arg(short, long)]
        repo: PathBuf,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: OutputFormat,

        /// Only print the answer
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Initialize a new configuration file
    Init,

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&TelemetryConfig::from_verbosity(cli.verbose, cli.debug))?;

    let mut cli_options = CliOptions {
        agent_command: cli.agent,
        max_iterations: cli.max_iterations,
        max_turns: cli.max_turns,
        timeout_seconds: cli.timeout,
        log_dir: cli.log_dir,
        host: None,
        port: None,
    };

    let cwd = std::env::current_dir()?;
    let workspace_root = config::find_workspace_root(&cwd).unwrap_or(cwd);

    match cli.command {
        Commands::Serve { host, port } => {
            cli_options.host = host;
            cli_options.port = port;
            let config = config::load_config(&workspace_root, cli_options)?;
            run_server(&config, &workspace_root).await
        }
        Commands::Ask {
            question,
            repo,
            output_format,
            quiet,
        } => {
            let config = config::load_config(&workspace_root, cli_options)?;
            handle_ask(&config, &workspace_root, &question, &repo, output_format, quiet).await
        }
        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                let config = config::load_config(&workspace_root, cli_options)?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
        },
        Commands::Init => {
            let path = config::init_config(&workspace_root)?;
            println!("Created config file: {}", path.display());
            Ok(())
        }
        Commands::Version => {
            println!("repo-expert {}", VERSION);
            Ok(())
        }
    }
}

/// Prepare the log directory and build an engine writing into it.
fn build_engine(
    config: &ResolvedConfig,
    workspace_root: &Path,
    echo_trace: bool,
) -> Result<(WorkflowEngine, PathBuf)> {
    let log_dir = match &config.log_dir {
        Some(dir) => init_log_dir(dir)?,
        None => init_log_dirs(workspace_root)?,
    };

    let mut sink = FileTraceSink::new(&log_dir);
    if !echo_trace {
        sink = sink.quiet();
    }

    let engine = WorkflowEngine::new(
        Arc::new(ClaudeCodeInvoker::new(config.invoker_config())),
        config.workflow_config(),
        Arc::new(sink),
    );
    Ok((engine, log_dir))
}

async fn run_server(config: &ResolvedConfig, workspace_root: &Path) -> Result<()> {
    let (engine, log_dir) = build_engine(config, workspace_root, true)?;
    let addr = config.bind_address();
    let card = AgentCard::new(format!("http://localhost:{}", config.port));

    println!("{}", "Repo Expert A2A Server".bright_blue().bold());
    println!("  Server: {}", format!("http://{addr}").bright_white());
    println!("  Logs:   {}", log_dir.display());
    println!("  Agent:  {}", config.agent_command);
    println!();
    println!("  Log files per task:");
    println!("    {{task_id}}.log - System logs");
    println!("    {{task_id}}{AGENT_LOG_SUFFIX} - Agent stream");
    println!();

    server::serve(&addr, AppState::new(Arc::new(engine), card)).await?;
    Ok(())
}

async fn handle_ask(
    config: &ResolvedConfig,
    workspace_root: &Path,
    question: &str,
    repo: &Path,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let (engine, log_dir) = build_engine(config, workspace_root, false)?;
    let task_id = TaskId::new();

    if !quiet {
        eprintln!(
            "{} Task {} ({} rounds max)",
            "→".cyan(),
            task_id.to_string().bright_white(),
            config.max_iterations
        );
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = match engine
        .run_with_cancel(question, repo, task_id.clone(), cancel_rx)
        .await
    {
        Ok(outcome) => outcome,
        Err(WorkflowError::Cancelled) => {
            eprintln!("{}", "Cancelled".yellow());
            std::process::exit(130);
        }
    };

    match format {
        OutputFormat::Text => {
            println!("{}", outcome.final_answer);
            if !quiet {
                let status = match outcome.status {
                    WorkflowStatus::Valid => outcome.status.to_string().green(),
                    WorkflowStatus::MaxIterationsReached => outcome.status.to_string().yellow(),
                    WorkflowStatus::Failed => outcome.status.to_string().red(),
                };
                eprintln!(
                    "\n{} after {} iteration(s)",
                    status,
                    outcome.iteration_count()
                );
                if let Some(cost) = outcome.total_cost() {
                    eprintln!("{}", format!("Cost: ${cost:.4}").dimmed());
                }
                eprintln!(
                    "{}",
                    format!("Logs: {}", log_dir.join(format!("{task_id}.log")).display()).dimmed()
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    if outcome.status == WorkflowStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
