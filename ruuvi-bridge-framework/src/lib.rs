//! Ruuvi Bridge Framework
//!
//! Common abstractions for bridges that poll a data source and publish the
//! results as retained MQTT messages.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`EnvOverlay`] for layering environment variables over a config file
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for publishing retained JSON messages over MQTT
//! - [`retry`] for bounded retries with exponential backoff
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use ruuvi_bridge_framework::{BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MyBridgeConfig::read("mybridge.json5")?;
//!     config.validate()?;
//!
//!     let mut runner = BridgeRunner::new("mybridge", config, None).await?;
//!
//!     // Spawn the polling worker
//!     runner.spawn(my_worker(runner.publisher()));
//!
//!     // Run until Ctrl+C
//!     runner.run_with_metadata(None).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod retry;
mod runner;
mod status;

pub use args::{BridgeArgs, CONFIG_FILE_ENV};
pub use config::{BridgeConfig, EnvOverlay, process_env};
pub use error::{BridgeError, Result};
pub use publisher::{BoxFuture, MqttTransport, PublishStats, Publisher};
pub use retry::{RetryError, RetryPolicy, retry};
pub use runner::BridgeRunner;
pub use status::{BridgeStatus, StatusPublisher};

// Re-export commonly used types from ruuvi-common
pub use ruuvi_common::{LogFormat, LoggingConfig, MqttConfig, TopicBuilder};
