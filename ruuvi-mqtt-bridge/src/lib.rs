//! Bridge republishing RuuviTag readings from InfluxDB to MQTT.
//!
//! Every poll cycle the bridge asks InfluxDB for the last value of each
//! tracked field per device and publishes one retained JSON message per
//! device. At startup it announces every sensor channel to Home Assistant via
//! MQTT discovery.
//!
//! # Topics
//!
//! ```text
//! ruuvi/<device name>                                   {"humidity":40.2,"temperature":21.5,...}
//! homeassistant/sensor/ruuvi_<device>_<field>/config    discovery config
//! ruuvi/bridge/status                                   {"bridge":...,"status":"running"}
//! ```

pub mod config;
pub mod discovery;
pub mod influx;
pub mod names;
pub mod poller;
