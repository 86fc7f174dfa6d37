//! batchcall - submit registered functions to a batch scheduler.
//!
//! `batchcall call add 1 2` writes a payload and job script, submits it, and
//! prints `3`. On the compute node the script runs `batchcall run`, which
//! executes the payload and writes the outcome file.
//!
//! Exit codes: 0 success, 1 the remote function failed, 2 anything else
//! (submission error, crash, timeout, bad arguments).

mod cli;
mod functions;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use batchcall_core::app::runner;
use batchcall_core::{
    CallEnvelope, Job, JobConfig, JobError, LocalScheduler, SchedulerClient, SchedulerOptions,
    SlurmScheduler,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{CallCommand, Cli, Command, SchedulerKind};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Worker output is appended to a log file, so no colours there.
    let worker = matches!(cli.command, Command::Run { .. });
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if worker { "info" } else { "warn" })),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!worker)
        .init();

    match cli.command {
        Command::Run { payload, result } => run_worker(&payload, &result).await,
        Command::Functions => match functions::registry() {
            Ok(registry) => {
                for name in registry.names() {
                    println!("{name}");
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::from(2)
            }
        },
        Command::Call(cmd) => match call(cmd).await {
            Ok(value) => {
                println!("{value}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err:#}");
                match err.downcast_ref::<JobError>() {
                    Some(JobError::Failed(_)) => ExitCode::from(1),
                    _ => ExitCode::from(2),
                }
            }
        },
    }
}

async fn run_worker(payload: &Path, result: &Path) -> ExitCode {
    let registry = match functions::registry() {
        Ok(registry) => registry,
        Err(err) => {
            tracing::error!(error = %err, "cannot build the function registry");
            return ExitCode::from(2);
        }
    };
    match runner::run_payload(&registry, payload, result).await {
        Ok(status) => exit_code(status.exit_code()),
        Err(err) => {
            tracing::error!(error = %err, "no outcome written");
            exit_code(err.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}

async fn call(cmd: CallCommand) -> anyhow::Result<serde_json::Value> {
    let registry = functions::registry()?;
    if !registry.contains(&cmd.function) {
        bail!(
            "unknown function {:?} (known: {})",
            cmd.function,
            registry.names().join(", ")
        );
    }

    let mut builder = CallEnvelope::builder(cmd.function.as_str());
    for (i, raw) in cmd.args.iter().enumerate() {
        builder = builder.arg(&parse_json(raw).with_context(|| format!("argument #{i}"))?);
    }
    for raw in &cmd.kwargs {
        let (name, value) = raw
            .split_once('=')
            .with_context(|| format!("--kwarg {raw:?} must look like NAME=JSON"))?;
        builder = builder.kwarg(name, &parse_json(value).with_context(|| format!("--kwarg {name}"))?);
    }
    let call = builder.build()?;

    let mut options = match &cmd.options {
        Some(path) => SchedulerOptions::load(path)?,
        None => SchedulerOptions::new(),
    };
    if let Some(partition) = cmd.partition {
        options = options.partition(partition);
    }
    if let Some(time) = cmd.time {
        options = options.time(time);
    }

    let mut config = JobConfig::from_env()?;
    if let Some(secs) = cmd.timeout_secs {
        config = config.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    if let Some(dir) = cmd.work_dir {
        config = config.with_work_dir(dir);
    }
    let mut template = config.template.clone();
    if let Some(before) = cmd.before {
        template = template.with_before(before);
    }
    if let Some(after) = cmd.after {
        template = template.with_after(after);
    }
    if let Some(launcher) = cmd.launcher {
        template.launcher = Some(launcher);
    }
    let keep = config.keep_artifacts || cmd.keep_artifacts;
    let config = config.with_template(template).with_keep_artifacts(keep);

    let scheduler: Arc<dyn SchedulerClient> = match cmd.scheduler {
        SchedulerKind::Slurm => Arc::new(SlurmScheduler::new()),
        SchedulerKind::Local => Arc::new(LocalScheduler::new()),
    };

    let mut job = Job::new(call, options, config, scheduler);
    let scheduler_id = job.submit().await?;
    info!(%scheduler_id, log = %job.paths().log.display(), "waiting for job");

    let outcome = tokio::select! {
        outcome = job.result() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(outcome) = outcome else {
        job.cancel().await?;
        bail!("interrupted, job {scheduler_id} cancelled");
    };

    if cmd.show_log {
        match job.read_log().await {
            Ok(log) => eprint!("{log}"),
            Err(e) => tracing::warn!(error = %e, "no job log"),
        }
    }
    Ok(outcome?)
}

fn parse_json(raw: &str) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(raw).with_context(|| format!("{raw:?} is not valid JSON"))
}
