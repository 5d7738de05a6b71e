//! Ucai - bounded, resumable iteration loops for Claude Code
//!
//! The binary is the process boundary for the plugin: Claude Code runs
//! `ucai hook <type>` for lifecycle events, and the `/iterate` slash command
//! runs `ucai setup`.

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ucai::hooks::{run_hook, HookContext, HookType};
use ucai::setup::{parse_args, tokenize, SetupCommand, USAGE};
use ucai::state::{max_display, Field, StateStore};
use ucai::ProjectConfig;

#[derive(Parser)]
#[command(name = "ucai")]
#[command(version)]
#[command(about = "Bounded, resumable iteration loops for Claude Code", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a lifecycle hook (event payload on stdin)
    Hook {
        /// Hook type
        #[arg(value_enum)]
        hook_type: HookType,

        /// Plugin install root used by the config guard
        #[arg(long, env = "CLAUDE_PLUGIN_ROOT")]
        plugin_root: Option<PathBuf>,
    },

    /// Start an iteration loop
    #[command(disable_help_flag = true)]
    Setup {
        /// Read the raw argument string from stdin
        #[arg(long)]
        stdin: bool,

        /// Task words and options (--max-iterations N, --completion-promise TEXT)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the current loop
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cancel the current loop
    Cancel,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "ucai=debug" } else { "ucai=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries the hook protocol, so logs always go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_stdin() -> io::Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    let config = match ProjectConfig::load(&project_path) {
        Ok(config) => config,
        Err(e) => {
            warn!("using default configuration: {}", e);
            ProjectConfig::default()
        }
    };

    match cli.command {
        Commands::Hook {
            hook_type,
            plugin_root,
        } => {
            let input = read_stdin().unwrap_or_else(|e| {
                warn!("failed to read hook input: {}", e);
                String::new()
            });

            let mut ctx = HookContext::new(&project_path, config);
            if let Some(root) = plugin_root {
                ctx = ctx.with_plugin_root(root);
            }

            let result = run_hook(hook_type, &ctx, &input);

            if let Some(output) = &result.output {
                match serde_json::to_string(output) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("failed to serialize hook output: {}", e),
                }
            }
            if let Some(message) = &result.message {
                eprintln!("{}", message);
            }
            std::process::exit(result.exit_code());
        }

        Commands::Setup { stdin, args } => {
            let args = if stdin {
                let mut words = tokenize(&read_stdin()?);
                words.extend(args);
                words
            } else {
                args
            };

            let store = StateStore::for_project(&config, &project_path);
            let started = parse_args(&args).and_then(|command| match command {
                SetupCommand::Help => Ok(None),
                SetupCommand::Start(request) => request.start(&store).map(|_| Some(request)),
            });

            match started {
                Ok(Some(request)) => println!("{}", request.summary()),
                Ok(None) => println!("{}", USAGE),
                Err(e) => {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                    std::process::exit(e.exit_code());
                }
            }
        }

        Commands::Status { json } => {
            let store = StateStore::for_project(&config, &project_path);
            let record = store.load();

            if json {
                let value = match &record {
                    Some(record) => serde_json::json!({
                        "active": record.is_active(),
                        "iteration": record.iteration().ok(),
                        "maxIterations": record.max_iterations().ok(),
                        "completionPromise": record.completion_promise(),
                        "startedAt": record.started_at().map(|t| t.to_rfc3339()),
                        "task": record.task(),
                        "path": store.path(),
                    }),
                    None => serde_json::json!({ "active": false }),
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            let Some(record) = record else {
                println!("{}", "No active iterate loop.".dimmed());
                return Ok(());
            };

            println!("{}", "Ucai iterate loop".bold());
            match (record.iteration(), record.max_iterations()) {
                (Ok(iteration), Ok(max)) => {
                    println!("  Iteration:          {}", iteration.to_string().cyan());
                    println!("  Max iterations:     {}", max_display(max));
                }
                (Err(e), _) | (_, Err(e)) => {
                    println!("  {} {}", "Corrupted:".red().bold(), e);
                }
            }
            println!(
                "  Completion promise: {}",
                record
                    .completion_promise()
                    .unwrap_or_else(|| "none".to_string())
            );
            if let Some(started_at) = record.started_at() {
                println!("  Started at:         {}", started_at.to_rfc3339());
            }
            println!("  Task:               {}", record.task());
            println!("  Record:             {}", store.path().display());
        }

        Commands::Cancel => {
            let store = StateStore::for_project(&config, &project_path);
            let iteration = store
                .load()
                .and_then(|record| record.raw(Field::Iteration).map(String::from));

            if store.delete()? {
                match iteration {
                    Some(n) => println!(
                        "{} Cancelled iterate loop at iteration {}",
                        "OK".green().bold(),
                        n
                    ),
                    None => println!("{} Removed iterate loop record", "OK".green().bold()),
                }
            } else {
                println!("{}", "No active iterate loop.".dimmed());
            }
        }
    }

    Ok(())
}
