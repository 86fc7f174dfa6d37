//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Run registered functions as batch jobs and collect their results.
#[derive(Parser, Debug)]
#[command(name = "batchcall", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one payload and write its outcome (invoked by job scripts).
    Run {
        #[arg(long)]
        payload: PathBuf,

        #[arg(long)]
        result: PathBuf,
    },

    /// Submit a call, wait for it, and print the return value as JSON.
    Call(CallCommand),

    /// List the functions this binary can run.
    Functions,
}

#[derive(Args, Debug)]
pub struct CallCommand {
    /// Registered function name.
    pub function: String,

    /// Positional arguments, each a JSON value (`3`, `"text"`, `[1,2]`).
    pub args: Vec<String>,

    /// Keyword argument as NAME=JSON. Repeatable.
    #[arg(long = "kwarg", value_name = "NAME=JSON")]
    pub kwargs: Vec<String>,

    #[arg(long, value_enum, env = "BATCHCALL_SCHEDULER", default_value_t = SchedulerKind::Slurm)]
    pub scheduler: SchedulerKind,

    /// JSON file with scheduler options, e.g. {"partition": "short", "time": "00:05:00"}.
    #[arg(long)]
    pub options: Option<PathBuf>,

    #[arg(long)]
    pub partition: Option<String>,

    /// Wall-clock limit passed to the scheduler (e.g. 00:10:00).
    #[arg(long)]
    pub time: Option<String>,

    /// Give up after this many seconds; 0 waits forever. Defaults to BATCHCALL_TIMEOUT_SECS or 600.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Shell lines inserted before the worker command.
    #[arg(long)]
    pub before: Option<String>,

    /// Shell lines inserted after the worker command.
    #[arg(long)]
    pub after: Option<String>,

    /// Prefix for the worker command, e.g. "apptainer exec image.sif".
    #[arg(long)]
    pub launcher: Option<String>,

    #[arg(long)]
    pub keep_artifacts: bool,

    /// Print the captured job log to stderr when the job ends.
    #[arg(long)]
    pub show_log: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Slurm,
    /// Run scripts as local bash processes.
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_collects_args_and_kwargs() {
        let cli = Cli::try_parse_from([
            "batchcall", "call", "add", "1", "2", "--kwarg", "scale=3", "--scheduler", "local",
            "--timeout-secs", "5",
        ])
        .unwrap();
        let Command::Call(call) = cli.command else {
            panic!("expected call");
        };
        assert_eq!(call.function, "add");
        assert_eq!(call.args, vec!["1", "2"]);
        assert_eq!(call.kwargs, vec!["scale=3"]);
        assert_eq!(call.scheduler, SchedulerKind::Local);
        assert_eq!(call.timeout_secs, Some(5));
    }

    #[test]
    fn run_requires_both_paths() {
        assert!(Cli::try_parse_from(["batchcall", "run", "--payload", "p"]).is_err());
        assert!(Cli::try_parse_from(["batchcall", "run", "--payload", "p", "--result", "r"]).is_ok());
    }
}
