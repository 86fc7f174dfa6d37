//! Per-job artifact paths.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::JobKey;

/// `<work_dir>/<function>-<job key>.{payload,sh,result,log}`
///
/// The job key is unique per `Job` instance, so two jobs for the same
/// function never share a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPaths {
    pub payload: PathBuf,
    pub script: PathBuf,
    pub result: PathBuf,
    pub log: PathBuf,
}

impl JobPaths {
    pub fn new(work_dir: &Path, function: &str, key: &JobKey) -> Self {
        let stem = format!("{}-{}", file_safe(function), key);
        Self {
            payload: work_dir.join(format!("{stem}.payload")),
            script: work_dir.join(format!("{stem}.sh")),
            result: work_dir.join(format!("{stem}.result")),
            log: work_dir.join(format!("{stem}.log")),
        }
    }

    /// Artifacts that only matter until the outcome has been read.
    pub fn transient(&self) -> [&Path; 3] {
        [
            self.payload.as_path(),
            self.script.as_path(),
            self.result.as_path(),
        ]
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn paths_share_a_stem_and_differ_per_key() {
        let dir = Path::new("/work");
        let k1 = JobKey::from_ulid(Ulid::new());
        let k2 = JobKey::from_ulid(Ulid::new());
        let a = JobPaths::new(dir, "add", &k1);
        let b = JobPaths::new(dir, "add", &k2);

        assert_eq!(a.payload, dir.join(format!("add-{k1}.payload")));
        assert_eq!(a.script.extension().unwrap(), "sh");
        assert_eq!(a.log.extension().unwrap(), "log");
        assert_ne!(a.result, b.result);
        assert_ne!(a.payload, b.payload);
    }

    #[test]
    fn function_names_cannot_escape_the_work_dir() {
        let key = JobKey::from_ulid(Ulid::new());
        let p = JobPaths::new(Path::new("/work"), "../etc/passwd", &key);
        assert_eq!(p.payload.parent().unwrap(), Path::new("/work"));
    }
}
