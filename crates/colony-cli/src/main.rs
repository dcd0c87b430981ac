//! colony-cli: run the planner service or plan one request against a snapshot file.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colony_api::{load_catalog, serve, ServiceConfig};
use colony_core::{Kernel, RuleOracle};
use contracts::{Intent, WorldSnapshot};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "colony-cli", version, about = "Goal-driven task planner for colony agents")]
struct Cli {
    /// TOML service config; `COLONY_*` env vars override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON item and recipe catalog, overriding the config file.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API.
    Serve {
        /// Listen address, e.g. 127.0.0.1:8080.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Compile the next action for one agent against a snapshot file.
    Plan {
        /// World snapshot as JSON.
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        agent: String,

        /// Intent name (Eat, Sleep, Craft, ...). The rule oracle decides when omitted.
        #[arg(long)]
        intent: Option<String>,

        /// Intent parameters as a JSON object, e.g. '{"product":"Coat"}'.
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Show the board a snapshot produces after one tick.
    Board {
        #[arg(long)]
        snapshot: PathBuf,
    },
}

fn read_snapshot(path: &Path) -> Result<WorldSnapshot, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("cannot read snapshot {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid snapshot {}: {err}", path.display()))
}

fn build_kernel(config: &ServiceConfig) -> Result<Kernel, String> {
    let catalog = load_catalog(config.catalog_path.as_deref()).map_err(|err| err.to_string())?;
    Ok(Kernel::new(catalog, config.planner.clone()))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

fn plan_once(
    config: &ServiceConfig,
    snapshot: &Path,
    agent: &str,
    intent: Option<&str>,
    params: &str,
) -> Result<(), String> {
    let kernel = build_kernel(config)?;
    let snapshot = read_snapshot(snapshot)?;
    kernel.begin_tick(&snapshot);

    let response = match intent {
        Some(name) => {
            let params: Value =
                serde_json::from_str(params).map_err(|err| format!("invalid --params: {err}"))?;
            let intent = Intent::from_parts(name, &params).map_err(|err| err.to_string())?;
            kernel.next_action(agent, intent, &snapshot)
        }
        None => {
            let oracle = RuleOracle::new(config.planner.clone());
            kernel.next_action_with(agent, &oracle, &snapshot)
        }
    };
    print_json(&response)
}

fn show_board(config: &ServiceConfig, snapshot: &Path) -> Result<(), String> {
    let kernel = build_kernel(config)?;
    let snapshot = read_snapshot(snapshot)?;
    let report = kernel.begin_tick(&snapshot);
    tracing::info!(
        retired = report.retired.len(),
        reopened = report.reopened.len(),
        posted = report.posted.len(),
        "tick applied"
    );
    print_json(&kernel.board_summary(&snapshot))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(catalog) = cli.catalog {
        config.catalog_path = Some(catalog);
    }

    let outcome = match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            println!("serving planner on http://{}", config.bind_addr);
            serve(config).await.map_err(|err| format!("server error: {err}"))
        }
        Commands::Plan {
            snapshot,
            agent,
            intent,
            params,
        } => plan_once(&config, &snapshot, &agent, intent.as_deref(), &params),
        Commands::Board { snapshot } => show_board(&config, &snapshot),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
