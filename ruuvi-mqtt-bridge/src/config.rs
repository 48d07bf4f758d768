//! Configuration for the Ruuvi MQTT bridge.
//!
//! Settings are layered, lowest precedence first: built-in defaults, an
//! optional JSON5 file, environment variables, then command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use serde::{Deserialize, Serialize};

use ruuvi_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeError, EnvOverlay, LoggingConfig, MqttConfig, Result,
    RetryPolicy, TopicBuilder,
};
use ruuvi_common::topic::{DEFAULT_DISCOVERY_PREFIX, DEFAULT_TOPIC_PREFIX};

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuuviBridgeConfig {
    /// InfluxDB connection and query settings.
    pub influx: InfluxConfig,

    /// MQTT broker connection settings.
    pub mqtt: MqttConfig,

    /// Topics, polling and name mapping.
    pub bridge: BridgeSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Environment values that could not be parsed.
    #[serde(skip)]
    warnings: Vec<String>,
}

/// InfluxDB 1.x settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// Base URL of the InfluxDB HTTP API.
    pub url: String,

    /// Database to query.
    pub database: String,

    /// Measurement holding the RuuviTag readings.
    pub measurement: String,

    /// Username for HTTP basic auth.
    pub username: Option<String>,

    /// Password for HTTP basic auth; only sent with `username`.
    pub password: Option<String>,

    /// Tag identifying the device a series belongs to.
    pub device_tag: String,

    /// Only readings newer than this are considered.
    #[serde(with = "ruuvi_common::duration")]
    pub lookback: Duration,

    /// HTTP request timeout.
    #[serde(with = "ruuvi_common::duration")]
    pub timeout: Duration,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            database: "ruuvi".to_string(),
            measurement: "ruuvi_measurements".to_string(),
            username: None,
            password: None,
            device_tag: "mac".to_string(),
            lookback: Duration::from_secs(10 * 60),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Bridge behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Prefix of the per-device state topics.
    pub topic_prefix: String,

    /// Home Assistant discovery prefix.
    pub discovery_prefix: String,

    /// Time between poll cycles.
    #[serde(with = "ruuvi_common::duration")]
    pub scrape_interval: Duration,

    /// Properties file mapping device identifiers to display names.
    pub properties_file: PathBuf,

    /// Query attempts per poll cycle.
    pub max_attempts: u32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
            scrape_interval: Duration::from_secs(5),
            properties_file: PathBuf::from("ruuvi-names.properties"),
            max_attempts: 5,
        }
    }
}

/// Command-line overrides for individual settings.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// InfluxDB base URL (env: INFLUX_URL).
    #[arg(long)]
    pub influx_url: Option<String>,

    /// InfluxDB database name (env: INFLUX_DB).
    #[arg(long)]
    pub influx_db: Option<String>,

    /// InfluxDB measurement (env: INFLUX_MEASUREMENT).
    #[arg(long)]
    pub influx_measurement: Option<String>,

    /// InfluxDB username (env: INFLUX_USER).
    #[arg(long)]
    pub influx_user: Option<String>,

    /// InfluxDB password (env: INFLUX_PASS).
    #[arg(long)]
    pub influx_pass: Option<String>,

    /// Tag holding the device identifier (env: INFLUX_DEVICE_TAG).
    #[arg(long)]
    pub influx_device_tag: Option<String>,

    /// Query lookback window, e.g. 10m (env: INFLUX_LOOKBACK).
    #[arg(long, value_parser = parse_duration_arg)]
    pub influx_lookback: Option<Duration>,

    /// InfluxDB request timeout, e.g. 10s (env: INFLUX_TIMEOUT).
    #[arg(long, value_parser = parse_duration_arg)]
    pub influx_timeout: Option<Duration>,

    /// MQTT broker host (env: MQTT_HOST).
    #[arg(long)]
    pub mqtt_host: Option<String>,

    /// MQTT broker port (env: MQTT_PORT).
    #[arg(long)]
    pub mqtt_port: Option<u16>,

    /// MQTT username (env: MQTT_USER).
    #[arg(long)]
    pub mqtt_user: Option<String>,

    /// MQTT password (env: MQTT_PASS).
    #[arg(long)]
    pub mqtt_pass: Option<String>,

    /// MQTT client id (env: MQTT_CLIENT_ID).
    #[arg(long)]
    pub mqtt_client_id: Option<String>,

    /// Base MQTT topic (env: MQTT_TOPIC_PREFIX).
    #[arg(long)]
    pub mqtt_topic_prefix: Option<String>,

    /// Home Assistant discovery prefix (env: DISCOVERY_PREFIX).
    #[arg(long)]
    pub discovery_prefix: Option<String>,

    /// Time between polls, e.g. 5s (env: SCRAPE_INTERVAL).
    #[arg(long, value_parser = parse_duration_arg)]
    pub scrape_interval: Option<Duration>,

    /// Path to the identifier=name properties file (env: PROPERTIES_FILE).
    #[arg(long)]
    pub properties_file: Option<PathBuf>,

    /// Query attempts per poll cycle (env: QUERY_MAX_ATTEMPTS).
    #[arg(long)]
    pub query_max_attempts: Option<u32>,
}

fn parse_duration_arg(value: &str) -> std::result::Result<Duration, String> {
    ruuvi_common::parse_duration(value).map_err(|e| e.to_string())
}

/// Command-line interface of the bridge binary.
#[derive(Parser, Debug)]
#[command(name = "ruuvi-mqtt-bridge")]
#[command(about = "Republish RuuviTag readings from InfluxDB to MQTT")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub common: BridgeArgs,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

impl RuuviBridgeConfig {
    /// Build the effective configuration from the CLI and an environment
    /// lookup, then validate it.
    pub fn resolve<F>(cli: &Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match cli.common.config_path(&lookup) {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };

        config.apply_env(lookup);
        config.apply_overrides(&cli.common, &cli.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variables; unparseable values are kept as warnings.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvOverlay::new(lookup);

        env.string("INFLUX_URL", &mut self.influx.url);
        env.string("INFLUX_DB", &mut self.influx.database);
        env.string("INFLUX_MEASUREMENT", &mut self.influx.measurement);
        env.optional("INFLUX_USER", &mut self.influx.username);
        env.optional("INFLUX_PASS", &mut self.influx.password);
        env.string("INFLUX_DEVICE_TAG", &mut self.influx.device_tag);
        env.duration("INFLUX_LOOKBACK", &mut self.influx.lookback);
        env.duration("INFLUX_TIMEOUT", &mut self.influx.timeout);

        env.string("MQTT_HOST", &mut self.mqtt.host);
        env.parsed("MQTT_PORT", &mut self.mqtt.port);
        env.optional("MQTT_USER", &mut self.mqtt.username);
        env.optional("MQTT_PASS", &mut self.mqtt.password);
        env.string("MQTT_CLIENT_ID", &mut self.mqtt.client_id);

        env.string("MQTT_TOPIC_PREFIX", &mut self.bridge.topic_prefix);
        env.string("DISCOVERY_PREFIX", &mut self.bridge.discovery_prefix);
        env.duration("SCRAPE_INTERVAL", &mut self.bridge.scrape_interval);
        env.path("PROPERTIES_FILE", &mut self.bridge.properties_file);
        env.parsed("QUERY_MAX_ATTEMPTS", &mut self.bridge.max_attempts);

        env.string("LOG_LEVEL", &mut self.logging.level);
        env.parsed("LOG_FORMAT", &mut self.logging.format);

        self.warnings.extend(env.into_warnings());
    }

    /// Apply command-line flags.
    pub fn apply_overrides(&mut self, common: &BridgeArgs, flags: &ConfigOverrides) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        fn set_some<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        set(&mut self.influx.url, &flags.influx_url);
        set(&mut self.influx.database, &flags.influx_db);
        set(&mut self.influx.measurement, &flags.influx_measurement);
        set_some(&mut self.influx.username, &flags.influx_user);
        set_some(&mut self.influx.password, &flags.influx_pass);
        set(&mut self.influx.device_tag, &flags.influx_device_tag);
        set(&mut self.influx.lookback, &flags.influx_lookback);
        set(&mut self.influx.timeout, &flags.influx_timeout);

        set(&mut self.mqtt.host, &flags.mqtt_host);
        set(&mut self.mqtt.port, &flags.mqtt_port);
        set_some(&mut self.mqtt.username, &flags.mqtt_user);
        set_some(&mut self.mqtt.password, &flags.mqtt_pass);
        set(&mut self.mqtt.client_id, &flags.mqtt_client_id);

        set(&mut self.bridge.topic_prefix, &flags.mqtt_topic_prefix);
        set(&mut self.bridge.discovery_prefix, &flags.discovery_prefix);
        set(&mut self.bridge.scrape_interval, &flags.scrape_interval);
        set(&mut self.bridge.properties_file, &flags.properties_file);
        set(&mut self.bridge.max_attempts, &flags.query_max_attempts);

        set(&mut self.logging.level, &common.log_level);
        set(&mut self.logging.format, &common.log_format);
    }

    /// Retry policy for one poll cycle's query.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_attempts(self.bridge.max_attempts)
    }

    /// Topic builder for state, discovery and status topics.
    pub fn topics(&self) -> TopicBuilder {
        TopicBuilder::new(&self.bridge.topic_prefix, &self.bridge.discovery_prefix)
    }
}

impl BridgeConfig for RuuviBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn topic_prefix(&self) -> &str {
        &self.bridge.topic_prefix
    }

    fn validate(&self) -> Result<()> {
        if self.influx.url.trim().is_empty() {
            return Err(BridgeError::validation("influx.url must not be empty"));
        }
        if self.influx.database.is_empty() {
            return Err(BridgeError::validation("influx.database must not be empty"));
        }
        if self.influx.measurement.is_empty() {
            return Err(BridgeError::validation(
                "influx.measurement must not be empty",
            ));
        }
        if self.influx.device_tag.is_empty() {
            return Err(BridgeError::validation("influx.device_tag must not be empty"));
        }
        if self.mqtt.host.is_empty() {
            return Err(BridgeError::validation("mqtt.host must not be empty"));
        }
        if self.mqtt.port == 0 {
            return Err(BridgeError::validation("mqtt.port must be > 0"));
        }
        if !self.mqtt.keep_alive.is_zero() && self.mqtt.keep_alive < Duration::from_secs(1) {
            return Err(BridgeError::validation(
                "mqtt.keep_alive must be 0 or at least 1s",
            ));
        }
        if self.bridge.topic_prefix.trim_matches('/').is_empty() {
            return Err(BridgeError::validation(
                "bridge.topic_prefix must not be empty",
            ));
        }
        if self.bridge.discovery_prefix.trim_matches('/').is_empty() {
            return Err(BridgeError::validation(
                "bridge.discovery_prefix must not be empty",
            ));
        }
        if self.bridge.scrape_interval.is_zero() {
            return Err(BridgeError::validation(
                "bridge.scrape_interval must be > 0",
            ));
        }
        if self.bridge.max_attempts == 0 {
            return Err(BridgeError::validation("bridge.max_attempts must be > 0"));
        }

        Ok(())
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
