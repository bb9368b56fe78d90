use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Value, json};
use tracing::{info, warn};

use nimbus_core::domain::params::{INPUT_PDB_FILE_KEY, SERVICE_KEY};
use nimbus_core::observability::{LogFormat, init_logging};
use nimbus_core::{ExecutorBuilder, NimConfig, PolledTask, TaskParameters, TaskSpec};

/// Run one NIM inference call as a polled task.
#[derive(Debug, Parser)]
#[command(name = "nimbus", version)]
struct Args {
    /// Target service (rfdiffusion, openfold2, alphafold2, esmfold or any
    /// configured name).
    #[arg(long)]
    service: String,

    /// Task parameter as key=value. Values that parse as JSON are sent as
    /// JSON, anything else as a string.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Structure file to embed as `input_pdb`.
    #[arg(long)]
    input_pdb_file: Option<PathBuf>,

    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,

    #[arg(long)]
    json_logs: bool,
}

fn parse_param(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("parameter '{raw}' is not of the form key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("parameter '{raw}' has an empty key");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn task_params(args: &Args) -> Result<TaskParameters> {
    let mut params = TaskParameters::new();
    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        params = params.with(key, value);
    }
    if let Some(file) = &args.input_pdb_file {
        let file = std::path::absolute(file)
            .with_context(|| format!("cannot resolve {}", file.display()))?;
        params = params.with(INPUT_PDB_FILE_KEY, file.to_string_lossy().into_owned());
    }
    Ok(params.with(SERVICE_KEY, args.service.clone()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let config = match &args.config {
        Some(path) => NimConfig::from_json_file(path)?,
        None => NimConfig::default(),
    };

    let executor = ExecutorBuilder::new()
        .config(config)
        .expect_services(&[args.service.as_str()])
        .build()
        .context("cannot start executor")?;

    let mut spec = TaskSpec::new(task_params(&args)?, &args.work_dir);
    if let Some(name) = &args.name {
        spec = spec.named(name.clone());
    }
    let task = executor.create_task(spec)?;
    task.submit()?;

    let mut interval = tokio::time::interval(Duration::from_secs(args.poll_interval_secs.max(1)));
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if task.poll_running() {
                    info!(task_id = %task.id(), "running");
                }
                if task.poll_completed() {
                    break;
                }
            }
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "cannot listen for ctrl-c");
                }
                task.kill();
                task.poll_completed();
                break;
            }
        }
    }

    let Some(status) = task.status() else {
        bail!("task {} left the poll loop without a status", task.id());
    };
    let summary = json!({
        "task_id": task.id().to_string(),
        "service": task.service(),
        "status": status,
        "primary_output": task.primary_output(),
        "work_dir": task.work_dir(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(ExitCode::from(u8::try_from(status.exit_status()).unwrap_or(1)))
}
