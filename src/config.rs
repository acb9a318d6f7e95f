use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::sandbox::{Executor, NodeBackend, NodeOptions};

pub const DEFAULT_CONFIG_FILE: &str = "haunted-raid.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub puzzles_dir: PathBuf,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    pub node: PathBuf,
    pub budget_ms: u64,
    pub startup_grace_ms: u64,
    pub max_output_bytes: usize,
    pub heap_limit_mb: u32,
    pub permission_flag: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            puzzles_dir: PathBuf::from("puzzles/haunted_house"),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let node = NodeOptions::default();
        SandboxConfig {
            node: node.node,
            budget_ms: 1000,
            startup_grace_ms: 2000,
            max_output_bytes: node.max_output_bytes,
            heap_limit_mb: node.heap_limit_mb,
            permission_flag: node.permission_flag,
        }
    }
}

impl Config {
    /// Reads `path` if given; otherwise `haunted-raid.toml` in the working
    /// directory when it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config = match path {
            Some(path) => Config::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.check()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.sandbox.budget_ms == 0 {
            return Err(ConfigError::Invalid("sandbox.budget_ms must be positive".into()));
        }
        if self.sandbox.heap_limit_mb == 0 {
            return Err(ConfigError::Invalid("sandbox.heap_limit_mb must be positive".into()));
        }
        if self.sandbox.max_output_bytes == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.max_output_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl SandboxConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn executor(&self) -> Executor {
        let backend = NodeBackend::new(NodeOptions {
            node: self.node.clone(),
            heap_limit_mb: self.heap_limit_mb,
            max_output_bytes: self.max_output_bytes,
            permission_flag: self.permission_flag.clone(),
        });
        Executor::new(Arc::new(backend))
            .with_budget(self.budget())
            .with_startup_grace(Duration::from_millis(self.startup_grace_ms))
    }
}
