//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Args;

use ruuvi_common::LogFormat;

/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

/// Common CLI arguments for all bridges.
///
/// Flatten this into a bridge's own `clap::Parser`.
#[derive(Args, Debug, Clone, Default)]
pub struct BridgeArgs {
    /// Path to an optional JSON5 configuration file (env: CONFIG_FILE).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error) (env: LOG_LEVEL).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (text, json) (env: LOG_FORMAT).
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl BridgeArgs {
    /// Configuration file path: the `--config` flag, else `CONFIG_FILE`.
    pub fn config_path<F>(&self, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.config.clone().or_else(|| {
            lookup(CONFIG_FILE_ENV)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        })
    }
}
