use std::path::{Path, PathBuf};
use std::time::Duration;

use eirene_spawn::OutputThrottle;
use eirene_tasks::RetryPolicy;
use serde::Deserialize;

/// One positional argument of `eirenewatch`: a declarative TOML description
/// of what config file to watch and what command to run per slot, in place
/// of a dynamically loaded script module.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskFile {
    /// Path to the config file this task file's pool watches, relative to
    /// the task file itself unless absolute.
    pub config: PathBuf,
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    pub template: TemplateSpec,
}

fn default_wait_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub initial_run: bool,
    #[serde(default = "default_true")]
    pub interruptible: bool,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub retry: RetrySpec,
    #[serde(default)]
    pub throttle: ThrottleSpec,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySpec {
    #[serde(default)]
    pub retries: u32,
    pub factor: Option<f64>,
    pub min_timeout_ms: Option<u64>,
    pub max_timeout_ms: Option<u64>,
}

impl RetrySpec {
    pub fn to_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            retries: self.retries,
            factor: self.factor.unwrap_or(default.factor),
            min_timeout: self.min_timeout_ms.map(Duration::from_millis).unwrap_or(default.min_timeout),
            max_timeout: self.max_timeout_ms.map(Duration::from_millis).unwrap_or(default.max_timeout),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThrottleSpec {
    pub interval_ms: Option<u64>,
}

impl ThrottleSpec {
    pub fn to_throttle(&self) -> OutputThrottle {
        match self.interval_ms {
            Some(ms) => OutputThrottle::every(Duration::from_millis(ms)),
            None => OutputThrottle::unthrottled(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskFileError {
    #[error("task file not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read task file {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse task file {path}: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

pub fn load(path: &Path) -> Result<TaskFile, TaskFileError> {
    if !path.exists() {
        return Err(TaskFileError::Missing(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|source| TaskFileError::Io { path: path.to_path_buf(), source })?;

    let mut file: TaskFile =
        toml::from_str(&raw).map_err(|source| TaskFileError::Parse { path: path.to_path_buf(), source })?;

    if file.config.is_relative() {
        if let Some(parent) = path.parent() {
            file.config = parent.join(&file.config);
        }
    }

    Ok(file)
}

/// Expands a positional argument into one or more task-file paths. Entries
/// containing `*` are glob-expanded; a missing literal path is an error
/// surfaced by the caller as exit code 1.
pub fn expand_paths(pattern: &str) -> Result<Vec<PathBuf>, TaskFileError> {
    if pattern.contains('*') {
        let paths: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|_| TaskFileError::Missing(PathBuf::from(pattern)))?
            .filter_map(Result::ok)
            .collect();
        Ok(paths)
    } else {
        let path = PathBuf::from(pattern);
        if path.exists() {
            Ok(vec![path])
        } else {
            Err(TaskFileError::Missing(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_task_file() {
        let raw = r#"
            config = "services.toml"

            [template]
            name = "worker"
            command = "node"
            args = ["server.js"]
        "#;
        let file: TaskFile = toml::from_str(raw).unwrap();
        assert_eq!(file.wait_ms, 200);
        assert_eq!(file.template.name, "worker");
        assert!(file.template.initial_run);
        assert!(file.template.interruptible);
        assert!(!file.template.persistent);
    }

    #[test]
    fn missing_literal_path_is_an_error() {
        let err = expand_paths("/definitely/not/a/real/path.toml").unwrap_err();
        assert!(matches!(err, TaskFileError::Missing(_)));
    }
}
