//! Ruuvi InfluxDB to MQTT bridge.
//!
//! Polls InfluxDB for the latest RuuviTag readings and republishes them as
//! retained MQTT messages with Home Assistant discovery.

use anyhow::{Context, Result};
use clap::Parser;
use ruuvi_bridge_framework::{BridgeRunner, process_env};

use ruuvi_mqtt_bridge::config::{Cli, RuuviBridgeConfig};
use ruuvi_mqtt_bridge::influx::InfluxClient;
use ruuvi_mqtt_bridge::names::NameMap;
use ruuvi_mqtt_bridge::poller::Poller;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve configuration: defaults, file, environment, flags
    let config = RuuviBridgeConfig::resolve(&cli, process_env)?;

    let names = NameMap::load(&config.bridge.properties_file)?;
    let influx = InfluxClient::new(&config.influx).context("Failed to create InfluxDB client")?;

    // Create the bridge runner (logging, MQTT connection, status)
    let mut runner = BridgeRunner::new("ruuvi-mqtt-bridge", config, Some(&cli.common))
        .await
        .context("Failed to start bridge")?;

    let bridge = &runner.config().bridge;
    tracing::info!(
        path = %bridge.properties_file.display(),
        devices = names.len(),
        "Loaded device name mappings"
    );
    tracing::info!(
        influx = %runner.config().influx.url,
        database = %runner.config().influx.database,
        broker = %runner.config().mqtt.address(),
        prefix = %bridge.topic_prefix,
        interval = %ruuvi_common::format_duration(bridge.scrape_interval),
        "Ruuvi bridge running"
    );

    let metadata = serde_json::json!({
        "devices": names.len(),
        "influx": {
            "url": runner.config().influx.url,
            "database": runner.config().influx.database,
            "measurement": runner.config().influx.measurement,
        },
        "discovery_prefix": bridge.discovery_prefix,
        "scrape_interval": ruuvi_common::format_duration(bridge.scrape_interval),
    });

    let poller = Poller::new(influx, runner.publisher(), names, runner.config());
    runner.spawn(poller.run());

    // Run until Ctrl+C / SIGTERM (handles shutdown gracefully)
    runner.run_with_metadata(Some(metadata)).await?;

    Ok(())
}
