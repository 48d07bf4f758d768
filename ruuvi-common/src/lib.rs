//! Ruuvi Bridge Common Library
//!
//! This crate provides shared types and utilities for the Ruuvi InfluxDB to MQTT bridge:
//!
//! - [`telemetry`] - RuuviTag field metadata and reading types
//! - [`topic`] - MQTT topic builders
//! - [`config`] - MQTT and logging configuration (JSON5 format)
//! - [`duration`] - Human-readable duration parsing
//! - [`session`] - MQTT connection establishment
//! - [`error`] - Error types

pub mod config;
pub mod duration;
pub mod error;
pub mod session;
pub mod telemetry;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig, parse_config};
pub use duration::{format_duration, parse_duration};
pub use error::{Error, Result};
pub use session::{connect, mqtt_options};
pub use telemetry::{DeviceReadings, FIELDS, FieldSpec, ReadingSet, field_spec};
pub use topic::{TopicBuilder, object_token};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// use ruuvi_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
