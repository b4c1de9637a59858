use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

use rover::config::{load_config, resolve_config_path};
use rover::oracles::LocalPorts;
use rover::service::{MissionRequest, MissionService};
use rover::{logging, MissionReport, Position, Result, RoverError};

#[derive(Parser)]
#[command(name = "rover")]
#[command(about = "Grid rover mission runner with deterministic safety checks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: $ROVER_CONFIG or .rover/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one mission and print its report as JSON
    Run {
        /// Mission goal, e.g. "collect samples at (4,6)"
        #[arg(short, long)]
        goal: String,

        /// Obstacle cell as x,y (repeatable). Random obstacles when omitted
        #[arg(short, long = "obstacle", value_parser = parse_position)]
        obstacles: Vec<Position>,

        /// Seed for random obstacle placement
        #[arg(short, long, conflicts_with = "obstacles")]
        seed: Option<u64>,

        /// Delay before the mission starts
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Run several missions concurrently and print a JSON array of reports
    Batch {
        /// Mission goals (repeatable)
        #[arg(short, long = "goal", required = true)]
        goals: Vec<String>,

        /// Seed for random obstacle placement; mission n uses seed + n
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Print the normalized plan for a goal without executing it
    Plan {
        #[arg(short, long)]
        goal: String,
    },
}

fn parse_position(raw: &str) -> std::result::Result<Position, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{raw}'"))?;
    let x = x
        .trim()
        .parse()
        .map_err(|_| format!("invalid x coordinate in '{raw}'"))?;
    let y = y
        .trim()
        .parse()
        .map_err(|_| format!("invalid y coordinate in '{raw}'"))?;
    Ok(Position::new(x, y))
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = err.code(), "{err}");
            let body = serde_json::json!({ "error": { "code": err.code(), "message": err.to_string() } });
            eprintln!("{body}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(&resolve_config_path(cli.config)).await?;
    let service = MissionService::new(
        LocalPorts::new(config.grid(), config.progress_channel_capacity),
        config,
    );

    match cli.command {
        Commands::Run {
            goal,
            obstacles,
            seed,
            delay_ms,
        } => {
            let request = match (seed, obstacles.is_empty()) {
                (Some(seed), _) => MissionRequest::new(goal).with_seed(seed),
                (None, false) => MissionRequest::new(goal).with_obstacles(obstacles),
                (None, true) => MissionRequest::new(goal),
            };
            let handle = if delay_ms == 0 {
                service.spawn(&request).await
            } else {
                service
                    .schedule(&request, Duration::from_millis(delay_ms))
                    .await
            };

            let mission_id = handle.id();
            let interrupt = handle_interrupt(service.clone(), mission_id);
            let outcome = handle.wait().await;
            interrupt.abort();

            let outcome = outcome?;
            info!(%mission_id, status = %outcome.status, "mission finished");
            print_json(&outcome.report)?;
            service.retire(mission_id).await;
            Ok(())
        }

        Commands::Batch { goals, seed } => {
            let requests: Vec<MissionRequest> = goals
                .into_iter()
                .zip(0u64..)
                .map(|(goal, n)| match seed {
                    Some(seed) => MissionRequest::new(goal).with_seed(seed.wrapping_add(n)),
                    None => MissionRequest::new(goal),
                })
                .collect();
            let reports = service
                .run_all(&requests)
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .map(|outcome| outcome.report)
                .collect::<Vec<MissionReport>>();
            print_json(&reports)?;
            for report in &reports {
                service.retire(report.mission_id).await;
            }
            Ok(())
        }

        Commands::Plan { goal } => {
            let preview = service.preview_plan(&goal).await;
            print_json(&serde_json::json!({
                "goal": goal,
                "steps": preview.plan.iter().collect::<Vec<_>>(),
                "corrections": preview.corrections,
            }))
        }
    }
}

/// Ctrl-C cancels the running mission, which still reports.
fn handle_interrupt(
    service: MissionService<LocalPorts>,
    mission_id: rover::MissionId,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            service.cancel(mission_id).await;
        }
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).map_err(RoverError::from)?;
    println!("{body}");
    Ok(())
}
