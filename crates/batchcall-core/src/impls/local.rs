//! LocalScheduler - スクリプトを bash の子プロセスとして実行する
//!
//! 開発・テスト用。スケジューラ・オプションは解釈しません。
//! job id は子プロセスの pid です。

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{SchedulerError, SchedulerJobId, SchedulerOptions, SubmissionError};
use crate::ports::SchedulerClient;

pub struct LocalScheduler {
    shell: String,
    children: Mutex<HashMap<SchedulerJobId, Child>>,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Number of children still tracked (not yet observed as exited).
    pub async fn tracked(&self) -> usize {
        self.children.lock().await.len()
    }
}

#[async_trait]
impl SchedulerClient for LocalScheduler {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn submit(
        &self,
        script: &Path,
        options: &SchedulerOptions,
    ) -> Result<SchedulerJobId, SubmissionError> {
        if !options.is_empty() {
            debug!(?options, "local scheduler ignores scheduler options");
        }

        // The rendered script redirects its own output into the job log.
        let mut command = Command::new(&self.shell);
        command
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group, so cancel reaches the worker and the log pipe too.
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|source| SubmissionError::Launch {
                program: self.shell.clone(),
                source,
            })?;

        let pid = child
            .id()
            .ok_or_else(|| SubmissionError::UnparsableOutput("child exited before pid was read".into()))?;
        let job_id = SchedulerJobId::new(pid.to_string());
        self.children.lock().await.insert(job_id.clone(), child);
        Ok(job_id)
    }

    async fn is_active(&self, job_id: &SchedulerJobId) -> Result<bool, SchedulerError> {
        let mut children = self.children.lock().await;
        let Some(child) = children.get_mut(job_id) else {
            return Ok(false);
        };
        match child.try_wait() {
            Ok(None) => Ok(true),
            Ok(Some(status)) => {
                debug!(%job_id, %status, "local job exited");
                children.remove(job_id);
                Ok(false)
            }
            Err(e) => Err(SchedulerError::Query(format!("wait on pid {job_id}: {e}"))),
        }
    }

    async fn cancel(&self, job_id: &SchedulerJobId) -> Result<(), SchedulerError> {
        let mut children = self.children.lock().await;
        let Some(mut child) = children.remove(job_id) else {
            return Ok(());
        };
        kill_group(&mut child).map_err(|reason| SchedulerError::Cancel {
            job_id: job_id.clone(),
            reason,
        })?;
        // Reap without holding up the caller.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });
        Ok(())
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) -> Result<(), String> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // already reaped
        return Ok(());
    };
    let pgid = Pid::from_raw(pid as i32);
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(format!("killpg {pgid}: {e}")),
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> Result<(), String> {
    child.start_kill().map_err(|e| e.to_string())
}
