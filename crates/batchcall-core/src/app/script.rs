//! ScriptGenerator - ジョブスクリプトの生成
//!
//! 生成されるスクリプトは必ず次の順で動きます（テンプレートに関係なく）:
//! 1. ワーカー（`<worker> run --payload P --result R`）が payload を decode
//! 2. 関数を呼ぶ
//! 3. outcome を result に書き込む（fsync + rename 後に終了）
//! 4. 失敗なら非ゼロで終了（スケジューラの会計にも失敗が残る）
//!
//! 出力は 1 行ずつ `[<kind>:<job id>:<function>]` を付けて log に追記します。
//! テンプレートは `before` / `launcher` / `after` でこの流れを包むだけです。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::SchedulerOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptTemplate {
    pub shebang: String,
    /// Shell lines run before the worker (module loads, env tweaks).
    pub before: String,
    /// Prefix for the worker command, e.g. a container runtime.
    pub launcher: Option<String>,
    /// Shell lines run after the worker, before the script exits.
    pub after: String,
}

impl Default for ScriptTemplate {
    fn default() -> Self {
        Self {
            shebang: "#!/bin/bash".to_string(),
            before: String::new(),
            launcher: None,
            after: String::new(),
        }
    }
}

/// Everything a template needs to know about one job.
#[derive(Debug, Clone)]
pub struct ScriptContext<'a> {
    pub worker: &'a Path,
    pub payload_path: &'a Path,
    pub result_path: &'a Path,
    pub log_path: &'a Path,
    pub function: &'a str,
    pub scheduler_kind: &'a str,
    pub options: &'a SchedulerOptions,
}

impl ScriptTemplate {
    /// Run the worker inside a container runtime, e.g.
    /// `singularity exec --bind /project /images/env.simg`.
    pub fn containerized(launcher: impl Into<String>) -> Self {
        Self {
            launcher: Some(launcher.into()),
            ..Self::default()
        }
    }

    pub fn with_before(mut self, before: impl Into<String>) -> Self {
        self.before = before.into();
        self
    }

    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = after.into();
        self
    }

    pub fn render(&self, ctx: &ScriptContext<'_>) -> String {
        let mut script = String::new();
        script.push_str(&self.shebang);
        script.push('\n');
        for flag in ctx.options.to_flags() {
            script.push_str(&format!("#SBATCH {flag}\n"));
        }
        script.push_str("set -o pipefail\n");
        push_block(&mut script, &self.before);

        let tag = format!(
            "{}:${{SLURM_JOB_ID:-$$}}:{}",
            ctx.scheduler_kind,
            sanitize_tag(ctx.function)
        );
        let launcher = self
            .launcher
            .as_deref()
            .map(|l| format!("{l} "))
            .unwrap_or_default();
        script.push_str(&format!(
            "{launcher}{} run --payload {} --result {} 2>&1 \\\n",
            shell_quote(&ctx.worker.to_string_lossy()),
            shell_quote(&ctx.payload_path.to_string_lossy()),
            shell_quote(&ctx.result_path.to_string_lossy()),
        ));
        script.push_str(&format!(
            "  | while IFS= read -r line; do printf '%s\\n' \"[{tag}] $line\"; done >> {}\n",
            shell_quote(&ctx.log_path.to_string_lossy()),
        ));
        script.push_str("status=$?\n");
        push_block(&mut script, &self.after);
        script.push_str("exit $status\n");
        script
    }
}

fn push_block(script: &mut String, block: &str) {
    let block = block.trim_end();
    if !block.is_empty() {
        script.push_str(block);
        script.push('\n');
    }
}

/// Single-quote `s` for bash.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Function names end up inside a double-quoted string.
fn sanitize_tag(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with(template: &ScriptTemplate, options: &SchedulerOptions) -> String {
        template.render(&ScriptContext {
            worker: Path::new("/opt/bin/batchcall"),
            payload_path: Path::new("/work/add-job-1.payload"),
            result_path: Path::new("/work/add-job-1.result"),
            log_path: Path::new("/work/add-job-1.log"),
            function: "add",
            scheduler_kind: "slurm",
            options,
        })
    }

    #[test]
    fn default_script_runs_worker_and_propagates_status() {
        let script = render_with(&ScriptTemplate::default(), &SchedulerOptions::new());
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("set -o pipefail\n"));
        assert!(script.contains(
            "'/opt/bin/batchcall' run --payload '/work/add-job-1.payload' --result '/work/add-job-1.result'"
        ));
        assert!(script.contains("[slurm:${SLURM_JOB_ID:-$$}:add] $line"));
        assert!(script.contains(">> '/work/add-job-1.log'"));
        assert!(script.ends_with("status=$?\nexit $status\n"));
        assert!(!script.contains("#SBATCH"));
    }

    #[test]
    fn options_become_sbatch_directives() {
        let opts = SchedulerOptions::new().cpus_per_task(1).time("00:01:00");
        let script = render_with(&ScriptTemplate::default(), &opts);
        assert!(script.contains("#SBATCH --cpus-per-task=1\n#SBATCH --time=00:01:00\n"));
    }

    #[test]
    fn containerized_template_wraps_the_same_sequence() {
        let template = ScriptTemplate::containerized("singularity exec --bind /project env.simg")
            .with_before("module load singularity")
            .with_after("echo JOBEND");
        let script = render_with(&template, &SchedulerOptions::new());

        let before = script.find("module load singularity").unwrap();
        let run = script
            .find("singularity exec --bind /project env.simg '/opt/bin/batchcall' run")
            .unwrap();
        let status = script.find("status=$?").unwrap();
        let after = script.find("echo JOBEND").unwrap();
        assert!(before < run && run < status && status < after);
        assert!(script.ends_with("exit $status\n"));
    }

    #[test]
    fn quoting_survives_awkward_paths() {
        assert_eq!(shell_quote("/tmp/it's here"), r"'/tmp/it'\''s here'");
        assert_eq!(sanitize_tag("my fn\"x"), "my_fn_x");
    }
}
