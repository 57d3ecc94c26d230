use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use sweep_runner::{describe_plan, load_plan, run_sweep, PlanSummary, SweepSummary};

#[derive(Parser)]
#[command(name = "sweep", version, about = "Throughput sweep harness for distributed benchmark runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        plan: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        first_pair_only: bool,
        #[arg(long)]
        log_dir: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Describe {
        plan: PathBuf,
        #[arg(long)]
        json: bool,
    },
    Init {
        #[arg(default_value = "sweep.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            plan,
            dry_run,
            first_pair_only,
            log_dir,
            json,
        } => {
            let mut plan_value = load_plan(&plan)?;
            if dry_run {
                plan_value.control.dry_run = true;
            }
            if first_pair_only {
                plan_value.control.first_pair_only = true;
            }
            if let Some(dir) = log_dir {
                plan_value.control.log_dir = dir;
            }
            let summary = run_sweep(&plan_value)?;
            if json {
                emit_json(&json!({
                    "ok": true,
                    "command": "run",
                    "dry_run": plan_value.control.dry_run,
                    "commands_printed": summary.commands_printed,
                    "runs": runs_to_json(&summary),
                }));
            } else {
                for record in &summary.completed {
                    println!(
                        "{} t{} s{} r{}: {} events/s -> {}",
                        record.label,
                        record.sweep_point.threads,
                        record.sweep_point.streams,
                        record.run_index,
                        record.throughput,
                        record.log_path.display()
                    );
                }
                println!("runs_completed: {}", summary.completed.len());
                if plan_value.control.dry_run {
                    println!("commands_printed: {}", summary.commands_printed);
                }
            }
        }
        Commands::Describe { plan, json } => {
            let plan_value = load_plan(&plan)?;
            let summary = describe_plan(&plan_value);
            if json {
                emit_json(&summary_to_json(&summary));
            } else {
                print_summary(&summary);
            }
        }
        Commands::Init { path, force } => {
            if !force && path.exists() {
                return Err(anyhow::anyhow!(
                    "plan file already exists (use --force): {}",
                    path.display()
                ));
            }
            std::fs::write(&path, PLAN_TEMPLATE)?;
            println!("wrote: {}", path.display());
            println!("next: edit {} and check it with: sweep describe {}", path.display(), path.display());
            println!("next: keep dry_run on until the printed commands look right");
        }
    }
    Ok(())
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{{\"ok\":false,\"error\":\"failed to serialize JSON payload\"}}"),
    }
}

fn runs_to_json(summary: &SweepSummary) -> Value {
    Value::Array(
        summary
            .completed
            .iter()
            .map(|record| {
                json!({
                    "label": record.label,
                    "threads": record.sweep_point.threads,
                    "streams": record.sweep_point.streams,
                    "run_index": record.run_index,
                    "throughput": record.throughput,
                    "log": record.log_path.display().to_string(),
                })
            })
            .collect(),
    )
}

fn summary_to_json(summary: &PlanSummary) -> Value {
    json!({
        "ok": true,
        "command": "describe",
        "launcher": summary.launcher.map(|l| l.log_token()),
        "program": summary.program,
        "run_indices": [summary.first_run_index, summary.last_run_index],
        "log_dir": summary.log_dir.display().to_string(),
        "total_runs": summary.total_runs,
        "scenarios": summary.scenarios.iter().map(|s| json!({
            "label": s.label,
            "enabled": s.enabled,
            "environment": s.environment.to_string(),
            "paired": s.paired,
            "sweep_points": s.pair_count,
        })).collect::<Vec<_>>(),
    })
}

fn print_summary(summary: &PlanSummary) {
    match summary.launcher {
        Some(launcher) => println!("launcher: {}", launcher),
        None => println!("launcher: none"),
    }
    println!("program: {}", summary.program);
    println!(
        "run_indices: [{}, {})",
        summary.first_run_index, summary.last_run_index
    );
    println!("log_dir: {}", summary.log_dir.display());
    for scenario in &summary.scenarios {
        println!(
            "scenario {}: enabled={} environment={} paired={} sweep_points={}",
            scenario.label,
            scenario.enabled,
            scenario.environment,
            scenario.paired,
            scenario.pair_count
        );
    }
    println!("total_runs: {}", summary.total_runs);
}

const PLAN_TEMPLATE: &str = "\
launcher: openmpi            # openmpi | mpich; required for paired scenarios
program: cmsRun              # workload executable handed each descriptor
dry_run: true                # print commands without running; flip off when they look right
first_pair_only: false
first_run_index: 0
last_run_index: 1            # half-open range [first, last)
log_dir: logs
timeout_secs: 0              # 0 waits forever
scenarios:
  - label: node_a_standalone
    environment: framework-host   # framework-host | ngt | ngt-mpi
    host_local: node-a
    local_descriptor: local.py
    cpu_base_local: 32
    sweep_points: [[32, 24], [16, 12], [8, 6]]
  - label: node_a_node_b
    enabled: false
    environment: framework-host
    host_local: node-a
    host_remote: node-b
    local_descriptor: local.py
    remote_descriptor: remote.py
    transports: [rc_mlx5, sm, self]
    net_device_local: \"mlx5_2:1\"
    net_device_remote: \"mlx5_0:1\"
    gpus_local: \"0\"            # all | explicit device string; \"\" hides every device
    gpus_remote: \"0\"
    cpu_base_local: 0
    cpu_base_remote: 32
    sweep_points: [[32, 24], [8, 6]]
";
