//! Scheduler options and their translation to command-line flags.
//!
//! The options are pure configuration: the client never validates them, it
//! only turns each entry into one flag. Absent options are omitted, never
//! defaulted.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::SerializationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Mapping option name → value, e.g. `cpus_per_task = 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchedulerOptions {
    entries: BTreeMap<String, OptionValue>,
}

impl SchedulerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn partition(self, value: impl Into<String>) -> Self {
        self.set("partition", OptionValue::Text(value.into()))
    }

    /// Wall-clock limit in the scheduler's own syntax (`00:01:00`).
    pub fn time(self, value: impl Into<String>) -> Self {
        self.set("time", OptionValue::Text(value.into()))
    }

    pub fn mem(self, value: impl Into<String>) -> Self {
        self.set("mem", OptionValue::Text(value.into()))
    }

    pub fn mem_per_cpu(self, value: impl Into<String>) -> Self {
        self.set("mem_per_cpu", OptionValue::Text(value.into()))
    }

    pub fn cpus_per_task(self, value: u32) -> Self {
        self.set("cpus_per_task", value)
    }

    pub fn ntasks(self, value: u32) -> Self {
        self.set("ntasks", value)
    }

    pub fn output(self, value: impl Into<String>) -> Self {
        self.set("output", OptionValue::Text(value.into()))
    }

    pub fn error(self, value: impl Into<String>) -> Self {
        self.set("error", OptionValue::Text(value.into()))
    }

    pub fn job_name(self, value: impl Into<String>) -> Self {
        self.set("job_name", OptionValue::Text(value.into()))
    }

    pub fn account(self, value: impl Into<String>) -> Self {
        self.set("account", OptionValue::Text(value.into()))
    }

    pub fn qos(self, value: impl Into<String>) -> Self {
        self.set("qos", OptionValue::Text(value.into()))
    }

    /// Extra environment, e.g. `ALL,OMP_NUM_THREADS=4`.
    pub fn export(self, value: impl Into<String>) -> Self {
        self.set("export", OptionValue::Text(value.into()))
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// One `--kebab-name[=value]` flag per entry, sorted by name.
    /// `false` flags are dropped.
    pub fn to_flags(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(name, value)| {
                let flag = format!("--{}", name.replace('_', "-"));
                match value {
                    OptionValue::Flag(true) => Some(flag),
                    OptionValue::Flag(false) => None,
                    other => Some(format!("{flag}={other}")),
                }
            })
            .collect()
    }

    pub fn from_json_str(input: &str) -> Result<Self, SerializationError> {
        serde_json::from_str(input).map_err(|e| SerializationError::new("scheduler options", e))
    }

    pub fn load(path: &Path) -> Result<Self, SerializationError> {
        let what = format!("scheduler options file {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| SerializationError::new(&what, e))?;
        serde_json::from_str(&text).map_err(|e| SerializationError::new(what, e))
    }
}
