//! InfluxDB 1.x query executor.
//!
//! One InfluxQL query per poll cycle asks for the last value of every tracked
//! field, grouped by the device tag and limited to a trailing time window.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use ruuvi_bridge_framework::BoxFuture;
use ruuvi_common::{DeviceReadings, FIELDS, ReadingSet};

use crate::config::InfluxConfig;

/// Errors from a single query attempt. All of them are transient.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("InfluxDB returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("InfluxDB error: {0}")]
    Influx(String),
}

/// Source of the latest readings per device.
pub trait ReadingSource: Send + Sync + 'static {
    /// Fetch the latest reading of every device seen in the lookback window.
    fn latest(&self) -> BoxFuture<'_, Result<ReadingSet, QueryError>>;
}

/// HTTP client for the InfluxDB `/query` endpoint.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    endpoint: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
    device_tag: String,
    query: String,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/query", config.url.trim_end_matches('/')),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            device_tag: config.device_tag.clone(),
            query: build_query(&config.measurement, &config.device_tag, config.lookback),
        })
    }

    /// The InfluxQL statement sent every cycle.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Run the query once.
    pub async fn fetch(&self) -> Result<ReadingSet, QueryError> {
        let mut request = self.http.get(&self.endpoint).query(&[
            ("db", self.database.as_str()),
            ("q", self.query.as_str()),
        ]);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        tracing::debug!(endpoint = %self.endpoint, db = %self.database, "Querying InfluxDB");

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(QueryError::Status {
                status,
                body: body.trim().to_string(),
            });
        }

        parse_response(&body, &self.device_tag)
    }
}

impl ReadingSource for InfluxClient {
    fn latest(&self) -> BoxFuture<'_, Result<ReadingSet, QueryError>> {
        Box::pin(self.fetch())
    }
}

/// Build the last-value-per-field query.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ruuvi_mqtt_bridge::influx::build_query;
///
/// let query = build_query("ruuvi_measurements", "mac", Duration::from_secs(600));
/// assert!(query.starts_with("SELECT LAST(temperature) AS temperature, LAST(humidity) AS humidity"));
/// assert!(query.ends_with(r#"FROM "ruuvi_measurements" WHERE time > now() - 10m GROUP BY "mac""#));
/// ```
pub fn build_query(measurement: &str, device_tag: &str, lookback: Duration) -> String {
    let selections = FIELDS
        .iter()
        .map(|field| format!("LAST({0}) AS {0}", field.name))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "SELECT {} FROM {} WHERE time > now() - {} GROUP BY {}",
        selections,
        quote_identifier(measurement),
        format_lookback(lookback),
        quote_identifier(device_tag)
    )
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a duration as an InfluxQL duration literal in its largest exact unit.
pub fn format_lookback(lookback: Duration) -> String {
    let secs = lookback.as_secs();
    if lookback.subsec_nanos() == 0 {
        if secs == 0 {
            "0s".to_string()
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    } else if lookback.subsec_nanos() % 1_000_000 == 0 {
        format!("{}ms", lookback.as_millis())
    } else {
        format!("{}u", lookback.as_micros())
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Parse an InfluxDB JSON response into readings keyed by device identifier.
///
/// The first row of each series is the latest reading. The `time` column is
/// dropped. Series without rows or without the device tag are skipped.
pub fn parse_response(body: &str, device_tag: &str) -> Result<ReadingSet, QueryError> {
    let response: QueryResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(QueryError::Influx(error));
    }

    let mut readings = ReadingSet::new();

    for result in response.results {
        if let Some(error) = result.error {
            return Err(QueryError::Influx(error));
        }

        for series in result.series {
            let Some(device) = series.tags.get(device_tag).filter(|id| !id.is_empty()) else {
                tracing::debug!(tag = %device_tag, "Skipping series without device tag");
                continue;
            };
            let Some(row) = series.values.first() else {
                continue;
            };

            let fields: DeviceReadings = series
                .columns
                .iter()
                .zip(row)
                .filter(|(column, _)| column.as_str() != "time")
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect();

            readings.insert(device.clone(), fields);
        }
    }

    Ok(readings)
}
