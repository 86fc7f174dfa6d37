//! SlurmScheduler - sbatch / squeue / scancel を呼ぶ SchedulerClient
//!
//! CLI ツールそのものは再実装せず、呼び出して出力を解釈するだけです。

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{SchedulerError, SchedulerJobId, SchedulerOptions, SubmissionError};
use crate::ports::SchedulerClient;

#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    sbatch: String,
    squeue: String,
    scancel: String,
    user: Option<String>,
}

impl Default for SlurmScheduler {
    fn default() -> Self {
        Self {
            sbatch: "sbatch".to_string(),
            squeue: "squeue".to_string(),
            scancel: "scancel".to_string(),
            user: None,
        }
    }
}

impl SlurmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tool names (wrappers, absolute paths, ...).
    pub fn with_commands(
        mut self,
        sbatch: impl Into<String>,
        squeue: impl Into<String>,
        scancel: impl Into<String>,
    ) -> Self {
        self.sbatch = sbatch.into();
        self.squeue = squeue.into();
        self.scancel = scancel.into();
        self
    }

    /// Restrict the live listing to one user's jobs.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    fn listing_args(&self) -> Vec<String> {
        let mut args = vec!["--noheader".to_string(), "--format=%i".to_string()];
        if let Some(user) = &self.user {
            args.push(format!("--user={user}"));
        }
        args
    }
}

#[async_trait]
impl SchedulerClient for SlurmScheduler {
    fn kind(&self) -> &'static str {
        "slurm"
    }

    async fn submit(
        &self,
        script: &Path,
        options: &SchedulerOptions,
    ) -> Result<SchedulerJobId, SubmissionError> {
        let flags = options.to_flags();
        debug!(program = %self.sbatch, ?flags, script = %script.display(), "sbatch");

        let output = Command::new(&self.sbatch)
            .args(&flags)
            .arg(script)
            .output()
            .await
            .map_err(|source| SubmissionError::Launch {
                program: self.sbatch.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SubmissionError::Rejected {
                program: self.sbatch.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_submission_output(&stdout)
            .ok_or_else(|| SubmissionError::UnparsableOutput(stdout.trim().to_string()))
    }

    async fn is_active(&self, job_id: &SchedulerJobId) -> Result<bool, SchedulerError> {
        let output = run(&self.squeue, &self.listing_args()).await?;
        if !output.status.success() {
            return Err(SchedulerError::Query(format!(
                "`{}` exited with {}: {}",
                self.squeue,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(listing_contains(
            &String::from_utf8_lossy(&output.stdout),
            job_id,
        ))
    }

    async fn cancel(&self, job_id: &SchedulerJobId) -> Result<(), SchedulerError> {
        let output = run(&self.scancel, &[job_id.as_str().to_string()]).await?;
        if !output.status.success() {
            return Err(SchedulerError::Cancel {
                job_id: job_id.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

async fn run(program: &str, args: &[String]) -> Result<Output, SchedulerError> {
    Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| SchedulerError::Launch {
            program: program.to_string(),
            source,
        })
}

/// Extract the job id from sbatch's stdout.
///
/// Accepts the default `Submitted batch job <id>` line and the `--parsable`
/// form `<id>[;cluster]`.
pub fn parse_submission_output(stdout: &str) -> Option<SchedulerJobId> {
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(rest) = line.strip_prefix("Submitted batch job") {
            let id = rest.split_whitespace().next()?;
            return is_job_id(id).then(|| SchedulerJobId::new(id));
        }
        let id = line.split(';').next().unwrap_or(line);
        if is_job_id(id) {
            return Some(SchedulerJobId::new(id));
        }
    }
    None
}

fn is_job_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Whether a `squeue --format=%i` listing still shows `job_id`.
/// Array tasks appear as `<id>_<index>` or `<id>_[1-10]`.
pub fn listing_contains(listing: &str, job_id: &SchedulerJobId) -> bool {
    let id = job_id.as_str();
    listing.lines().map(str::trim).any(|entry| {
        entry == id
            || entry
                .strip_prefix(id)
                .is_some_and(|rest| rest.starts_with('_'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_format("Submitted batch job 123456\n", Some("123456"))]
    #[case::parsable("98765\n", Some("98765"))]
    #[case::parsable_with_cluster("98765;cluster-a\n", Some("98765"))]
    #[case::leading_noise("sbatch: note: defaults applied\nSubmitted batch job 42\n", Some("42"))]
    #[case::garbage("sbatch: error: something\n", None)]
    #[case::empty("", None)]
    fn submission_output(#[case] stdout: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            parse_submission_output(stdout),
            expected.map(SchedulerJobId::new)
        );
    }

    #[rstest]
    #[case::present("100\n101\n102\n", "101", true)]
    #[case::absent("100\n102\n", "101", false)]
    #[case::prefix_is_not_a_match("1010\n", "101", false)]
    #[case::array_task("101_3\n101_[4-9]\n", "101", true)]
    #[case::empty_listing("", "101", false)]
    fn live_listing(#[case] listing: &str, #[case] id: &str, #[case] active: bool) {
        assert_eq!(listing_contains(listing, &SchedulerJobId::new(id)), active);
    }

    #[test]
    fn listing_is_restricted_to_user_when_configured() {
        let s = SlurmScheduler::new().with_user("alice");
        assert_eq!(
            s.listing_args(),
            vec!["--noheader", "--format=%i", "--user=alice"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejected_submission_reports_stderr() {
        let s = SlurmScheduler::new().with_commands("false", "true", "true");
        let err = s
            .submit(Path::new("job.sh"), &SchedulerOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Rejected { program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn missing_sbatch_is_a_launch_error() {
        let s = SlurmScheduler::new().with_commands("batchcall-no-such-sbatch", "true", "true");
        let err = s
            .submit(Path::new("job.sh"), &SchedulerOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_listing_means_inactive() {
        // `true` prints nothing and succeeds, like squeue with no jobs.
        let s = SlurmScheduler::new().with_commands("sbatch", "true", "true");
        assert!(!s.is_active(&SchedulerJobId::new("7")).await.unwrap());
        s.cancel(&SchedulerJobId::new("7")).await.unwrap();
    }
}
