//! Configuration traits and utilities.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// file loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use ruuvi_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, MqttConfig, Result};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
///     pub topic_prefix: String,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn topic_prefix(&self) -> &str {
///         &self.topic_prefix
///     }
///
///     fn validate(&self) -> Result<()> {
///         if self.topic_prefix.is_empty() {
///             return Err(BridgeError::validation("topic_prefix must not be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT broker configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the topic prefix for this bridge.
    fn topic_prefix(&self) -> &str;

    /// Validate the configuration.
    ///
    /// Called once every layer has been applied. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Problems found while resolving the configuration that did not stop
    /// startup, such as unparseable environment values. Logged by the runner
    /// once tracing is up.
    fn warnings(&self) -> &[String] {
        &[]
    }

    /// Read a JSON5 configuration file without validating it.
    ///
    /// Further layers (environment, flags) are applied before
    /// [`validate`](Self::validate) is called.
    fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        Ok(config)
    }
}

/// Environment lookup backed by the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Applies environment variables on top of a configuration.
///
/// Empty variables are ignored. Values that fail to parse leave the target
/// untouched and are recorded as warnings instead of aborting startup.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ruuvi_bridge_framework::EnvOverlay;
///
/// let mut port: u16 = 1883;
/// let mut interval = Duration::from_secs(5);
///
/// let mut env = EnvOverlay::new(|key| match key {
///     "MQTT_PORT" => Some("not-a-port".to_string()),
///     "SCRAPE_INTERVAL" => Some("30s".to_string()),
///     _ => None,
/// });
/// env.parsed("MQTT_PORT", &mut port);
/// env.duration("SCRAPE_INTERVAL", &mut interval);
///
/// assert_eq!(port, 1883);
/// assert_eq!(interval, Duration::from_secs(30));
/// assert_eq!(env.into_warnings().len(), 1);
/// ```
pub struct EnvOverlay<F> {
    lookup: F,
    warnings: Vec<String>,
}

impl<F> EnvOverlay<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Create an overlay reading variables through `lookup`.
    pub fn new(lookup: F) -> Self {
        Self {
            lookup,
            warnings: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.is_empty())
    }

    /// Overwrite a string setting.
    pub fn string(&mut self, key: &str, target: &mut String) {
        if let Some(value) = self.get(key) {
            *target = value;
        }
    }

    /// Overwrite an optional string setting.
    pub fn optional(&mut self, key: &str, target: &mut Option<String>) {
        if let Some(value) = self.get(key) {
            *target = Some(value);
        }
    }

    /// Overwrite a filesystem path setting.
    pub fn path(&mut self, key: &str, target: &mut PathBuf) {
        if let Some(value) = self.get(key) {
            *target = PathBuf::from(value);
        }
    }

    /// Overwrite a setting parsed with [`FromStr`], keeping the current value
    /// on failure.
    pub fn parsed<T>(&mut self, key: &str, target: &mut T)
    where
        T: FromStr + Display,
        T::Err: Display,
    {
        if let Some(value) = self.get(key) {
            match value.trim().parse() {
                Ok(parsed) => *target = parsed,
                Err(e) => self.warn(key, &value, &*target, e),
            }
        }
    }

    /// Overwrite a duration setting (`5s`, `1m30s`, ...), keeping the current
    /// value on failure.
    pub fn duration(&mut self, key: &str, target: &mut Duration) {
        if let Some(value) = self.get(key) {
            match ruuvi_common::parse_duration(&value) {
                Ok(parsed) => *target = parsed,
                Err(e) => {
                    let current = ruuvi_common::format_duration(*target);
                    self.warn(key, &value, &current, e);
                }
            }
        }
    }

    fn warn(&mut self, key: &str, value: &str, kept: &dyn Display, error: impl Display) {
        self.warnings.push(format!(
            "could not parse {}={:?} ({}), using {}",
            key, value, error, kept
        ));
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Consume the overlay, returning the collected warnings.
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
