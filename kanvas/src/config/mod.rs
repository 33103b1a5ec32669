//! Configuration for the Kanvas engine and the `kanvas` replay tool.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/kanvas/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;

use kanvas_proto::ids::UserId;

use crate::executor::ExecutorConfig;
use crate::session::SessionConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// How the replay tool prints the final board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented outline of columns and tasks.
    #[default]
    Text,
    /// The board as pretty-printed JSON.
    Json,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    ordering: OrderingFileConfig,
    validation: ValidationFileConfig,
    session: SessionFileConfig,
    replay: ReplayFileConfig,
}

/// `[ordering]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct OrderingFileConfig {
    rank_step: Option<f64>,
}

/// `[validation]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ValidationFileConfig {
    max_column_name_len: Option<usize>,
    max_task_title_len: Option<usize>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    notice_buffer: Option<usize>,
    channel_capacity: Option<usize>,
}

/// `[replay]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ReplayFileConfig {
    format: Option<OutputFormat>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    // -- Ordering --
    /// Spacing used for provisional ranks.
    pub rank_step: f64,

    // -- Validation --
    /// Maximum column (and board) name length in characters.
    pub max_column_name_len: usize,
    /// Maximum task title length in characters.
    pub max_task_title_len: usize,

    // -- Session --
    /// Capacity of the notice channel.
    pub notice_buffer: usize,
    /// Capacity of event source channels.
    pub channel_capacity: usize,

    // -- Replay --
    /// Output format of the replay tool.
    pub format: OutputFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            rank_step: executor.rank_step,
            max_column_name_len: executor.max_column_name_len,
            max_task_title_len: executor.max_task_title_len,
            notice_buffer: 64,
            channel_capacity: 256,
            format: OutputFormat::Text,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path
    /// (`~/.config/kanvas/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            rank_step: cli
                .rank_step
                .or(file.ordering.rank_step)
                .filter(|step| step.is_finite() && *step > 0.0)
                .unwrap_or(defaults.rank_step),
            max_column_name_len: file
                .validation
                .max_column_name_len
                .unwrap_or(defaults.max_column_name_len),
            max_task_title_len: file
                .validation
                .max_task_title_len
                .unwrap_or(defaults.max_task_title_len),
            notice_buffer: file
                .session
                .notice_buffer
                .filter(|n| *n > 0)
                .unwrap_or(defaults.notice_buffer),
            channel_capacity: file
                .session
                .channel_capacity
                .filter(|n| *n > 0)
                .unwrap_or(defaults.channel_capacity),
            format: cli
                .format
                .or(file.replay.format)
                .unwrap_or(defaults.format),
        }
    }

    /// Executor limits derived from this configuration.
    #[must_use]
    pub const fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            rank_step: self.rank_step,
            max_column_name_len: self.max_column_name_len,
            max_task_title_len: self.max_task_title_len,
        }
    }

    /// Session settings for `user_id` derived from this configuration.
    #[must_use]
    pub const fn to_session_config(&self, user_id: UserId) -> SessionConfig {
        SessionConfig {
            user_id,
            notice_buffer: self.notice_buffer,
            channel_capacity: self.channel_capacity,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(
    version,
    about = "Replay board events onto a board snapshot and print the result"
)]
pub struct CliArgs {
    /// Board snapshot (JSON, as returned by the board endpoint).
    pub snapshot: PathBuf,

    /// Board messages to apply, one JSON frame per line.
    pub events: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, env = "KANVAS_FORMAT")]
    pub format: Option<OutputFormat>,

    /// Rank spacing used for provisional ranks.
    #[arg(long)]
    pub rank_step: Option<f64>,

    /// Path to config file (default: `~/.config/kanvas/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "KANVAS_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/kanvas.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("kanvas").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
