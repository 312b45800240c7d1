//! User configuration
//!
//! Settings are read from `config.toml` in the user config directory:
//!
//! ```text
//! $XDG_CONFIG_HOME/holyc/config.toml
//! ~/.config/holyc/config.toml
//! ```
//!
//! A missing file means defaults. An explicit `--config` path replaces the
//! lookup and must exist.
//!
//! ```toml
//! [runtime]
//! cpus = 4
//! task_stack = 2097152
//!
//! [repl]
//! prompt = "C:/Home> "
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::scheduler::SchedulerConfig;
use crate::runtime::stack::TrampolineConfig;
use crate::runtime::RuntimeConfig;

/// User-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    /// Runtime settings
    #[serde(default)]
    pub runtime: RuntimeSection,
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
}

/// `[runtime]` section. Unset keys fall back to the runtime defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeSection {
    /// Logical CPUs, one job worker each
    pub cpus: Option<usize>,
    /// Stack size of tasks that do not request one
    pub task_stack: Option<usize>,
    /// Stack size of job workers
    pub worker_stack: Option<usize>,
    /// Size of a fresh stack-growth segment
    pub segment_size: Option<usize>,
    /// Headroom kept before each guarded call
    pub red_zone: Option<usize>,
    /// Maximum bytes of live heap blocks
    pub heap_limit: Option<usize>,
}

impl RuntimeSection {
    /// Overlay the configured values on the runtime defaults.
    pub fn to_runtime_config(&self) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();
        let scheduler = SchedulerConfig {
            cpus: self.cpus.unwrap_or(defaults.scheduler.cpus),
            default_stack_size: self.task_stack.unwrap_or(defaults.scheduler.default_stack_size),
            worker_stack_size: self.worker_stack.unwrap_or(defaults.scheduler.worker_stack_size),
        };
        let trampoline = TrampolineConfig {
            red_zone: self.red_zone.unwrap_or(defaults.trampoline.red_zone),
            segment_size: self.segment_size.unwrap_or(defaults.trampoline.segment_size),
        };
        RuntimeConfig {
            scheduler,
            trampoline,
            heap_limit: self.heap_limit.unwrap_or(defaults.heap_limit),
        }
    }
}

/// `[repl]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplConfig {
    /// Prompt string
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Prompt while a unit is still open
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,
    /// History size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// History file path
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

fn default_prompt() -> String {
    "hc> ".to_string()
}

fn default_continuation_prompt() -> String {
    ".. ".to_string()
}

fn default_history_size() -> usize {
    1000
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            continuation_prompt: default_continuation_prompt(),
            history_size: default_history_size(),
            history_file: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config.is_empty() {
            return Some(PathBuf::from(xdg_config).join("holyc"));
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("holyc"));
    }

    None
}

/// Get the user config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load the configuration file at `path`.
pub fn load_config_file(path: &Path) -> Result<UserConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load user-level configuration
///
/// Returns the default config if the file doesn't exist.
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => Ok(UserConfig::default()),
    }
}

/// Load `explicit` if given, the user config otherwise.
pub fn load(explicit: Option<&Path>) -> Result<UserConfig, ConfigError> {
    match explicit {
        Some(path) => load_config_file(path),
        None => load_user_config(),
    }
}

#[cfg(test)]
mod tests;
