//! Integration tests for ruuvi-mqtt-bridge.
//!
//! InfluxDB is replaced by an in-process HTTP server and the MQTT broker by a
//! recording transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::get;
use rumqttc::{ClientError, QoS};
use tokio::sync::Mutex;

use ruuvi_bridge_framework::{BoxFuture, MqttTransport, PublishStats, Publisher, RetryPolicy};
use ruuvi_mqtt_bridge::config::RuuviBridgeConfig;
use ruuvi_mqtt_bridge::influx::{InfluxClient, QueryError};
use ruuvi_mqtt_bridge::names::NameMap;
use ruuvi_mqtt_bridge::poller::{CycleOutcome, Poller};

const TWO_DEVICES: &str = r#"{
    "results": [{
        "statement_id": 0,
        "series": [
            {
                "name": "ruuvi_measurements",
                "tags": { "mac": "aa:bb:cc:dd:ee:ff" },
                "columns": ["time", "temperature", "humidity", "pressure"],
                "values": [["2024-05-01T12:00:00Z", 21.5, 40.5, 1012.25]]
            },
            {
                "name": "ruuvi_measurements",
                "tags": { "mac": "11:22:33:44:55:66" },
                "columns": ["time", "temperature", "humidity", "pressure"],
                "values": [["2024-05-01T12:00:02Z", 80.0, 5.5, null]]
            }
        ]
    }]
}"#;

const NO_SERIES: &str = r#"{"results":[{"statement_id":0}]}"#;

/// Recorded request: query parameters and the Authorization header.
type SeenRequest = (HashMap<String, String>, Option<String>);

#[derive(Clone)]
struct FakeInflux {
    status: StatusCode,
    body: &'static str,
    fail_first: usize,
    hits: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<SeenRequest>>>,
}

impl FakeInflux {
    fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            fail_first: 0,
            hits: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn handle_query(
    State(fake): State<FakeInflux>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let hit = fake.hits.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    *fake.last_request.lock().await = Some((params, auth));

    if hit < fake.fail_first {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"timeout"}"#.to_string(),
        );
    }
    (fake.status, fake.body.to_string())
}

/// Serve the fake on an ephemeral port and return its base URL.
async fn serve(fake: FakeInflux) -> String {
    let app = Router::new()
        .route("/query", get(handle_query))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Clone, Default)]
struct Recorder {
    messages: Arc<Mutex<Vec<(String, QoS, bool, Vec<u8>)>>>,
}

impl Recorder {
    async fn payload(&self, topic: &str) -> Option<serde_json::Value> {
        self.messages
            .lock()
            .await
            .iter()
            .rev()
            .find(|(t, ..)| t == topic)
            .map(|(.., payload)| serde_json::from_slice(payload).unwrap())
    }

    async fn count(&self, prefix: &str) -> usize {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|(t, ..)| t.starts_with(prefix))
            .count()
    }
}

impl MqttTransport for Recorder {
    fn publish(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.messages
                .lock()
                .await
                .push((topic, qos, retain, payload));
            Ok(())
        })
    }
}

fn config(url: &str) -> RuuviBridgeConfig {
    let mut config = RuuviBridgeConfig::default();
    config.influx.url = url.to_string();
    config.influx.timeout = Duration::from_secs(5);
    config
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy::default().with_delay(Duration::from_millis(5))
}

fn poller(
    config: &RuuviBridgeConfig,
    names: NameMap,
    recorder: &Recorder,
) -> Poller<InfluxClient, Recorder> {
    let client = InfluxClient::new(&config.influx).unwrap();
    let publisher = Publisher::new(recorder.clone(), config.bridge.topic_prefix.clone());
    Poller::new(client, publisher, names, config).with_retry_policy(fast_retries())
}

fn kitchen_names() -> NameMap {
    NameMap::parse("# tags\naa:bb:cc:dd:ee:ff=Kitchen\n")
}

/// The Kitchen scenario end to end: discovery, then one cycle of readings.
#[tokio::test]
async fn test_kitchen_discovery_and_state() {
    let fake = FakeInflux::new(StatusCode::OK, TWO_DEVICES);
    let url = serve(fake.clone()).await;
    let config = config(&url);
    let recorder = Recorder::default();
    let mut poller = poller(&config, kitchen_names(), &recorder);

    let discovery = poller.announce(vec!["Kitchen".to_string()]).await;
    assert_eq!(discovery.success, ruuvi_common::FIELDS.len());

    let config_payload = recorder
        .payload("homeassistant/sensor/ruuvi_Kitchen_temperature/config")
        .await
        .expect("temperature discovery config");
    assert_eq!(config_payload["unit_of_measurement"], "°C");
    assert_eq!(config_payload["device_class"], "temperature");
    assert_eq!(config_payload["state_topic"], "ruuvi/Kitchen");
    assert_eq!(config_payload["value_template"], "{{ value_json.temperature }}");

    let outcome = poller.poll_once().await;
    assert!(matches!(outcome, CycleOutcome::Published { devices: 2, .. }));

    let kitchen = recorder.payload("ruuvi/Kitchen").await.expect("Kitchen state");
    assert_eq!(
        kitchen,
        serde_json::json!({ "temperature": 21.5, "humidity": 40.5, "pressure": 1012.25 })
    );

    for (_, qos, retain, _) in recorder.messages.lock().await.iter() {
        assert_eq!(*qos, QoS::AtMostOnce);
        assert!(*retain);
    }

    let (params, auth) = fake.last_request.lock().await.clone().unwrap();
    assert_eq!(params["db"], "ruuvi");
    assert!(params["q"].starts_with("SELECT LAST(temperature) AS temperature"));
    assert!(params["q"].contains(r#"FROM "ruuvi_measurements""#));
    assert!(params["q"].ends_with(r#"GROUP BY "mac""#));
    assert!(auth.is_none());
}

/// A device missing from the properties file is published under its identifier.
#[tokio::test]
async fn test_unmapped_device_uses_identifier() {
    let url = serve(FakeInflux::new(StatusCode::OK, TWO_DEVICES)).await;
    let config = config(&url);
    let recorder = Recorder::default();
    let mut poller = poller(&config, kitchen_names(), &recorder);

    poller.poll_once().await;

    let state = recorder
        .payload("ruuvi/11:22:33:44:55:66")
        .await
        .expect("state under identifier");
    assert_eq!(state["temperature"], 80.0);
    assert_eq!(state["pressure"], serde_json::Value::Null);

    let discovery = recorder
        .payload("homeassistant/sensor/ruuvi_11:22:33:44:55:66_humidity/config")
        .await
        .expect("discovery under identifier");
    assert_eq!(discovery["unique_id"], "ruuvi_11:22:33:44:55:66_humidity");
    assert_eq!(discovery["device"]["name"], "11:22:33:44:55:66");
}

#[tokio::test]
async fn test_empty_series_publishes_nothing() {
    let url = serve(FakeInflux::new(StatusCode::OK, NO_SERIES)).await;
    let config = config(&url);
    let recorder = Recorder::default();
    let mut poller = poller(&config, NameMap::default(), &recorder);

    let outcome = poller.poll_once().await;

    assert_eq!(
        outcome,
        CycleOutcome::Published {
            devices: 0,
            stats: PublishStats::default()
        }
    );
    assert!(recorder.messages.lock().await.is_empty());
}

#[tokio::test]
async fn test_http_failure_skips_cycle() {
    let fake = FakeInflux::new(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"boom"}"#);
    let url = serve(fake.clone()).await;
    let config = config(&url);
    let recorder = Recorder::default();
    let mut poller = poller(&config, kitchen_names(), &recorder);

    let outcome = poller.poll_once().await;

    assert_eq!(outcome, CycleOutcome::Skipped);
    assert_eq!(fake.hits(), 5);
    assert_eq!(recorder.count("ruuvi/").await, 0);
}

#[tokio::test]
async fn test_recovers_within_cycle() {
    let mut fake = FakeInflux::new(StatusCode::OK, TWO_DEVICES);
    fake.fail_first = 2;
    let url = serve(fake.clone()).await;
    let config = config(&url);
    let recorder = Recorder::default();
    let mut poller = poller(&config, kitchen_names(), &recorder);

    let outcome = poller.poll_once().await;

    assert!(matches!(outcome, CycleOutcome::Published { devices: 2, .. }));
    assert_eq!(fake.hits(), 3);
    assert!(recorder.payload("ruuvi/Kitchen").await.is_some());
}

#[tokio::test]
async fn test_malformed_body_is_retried() {
    let fake = FakeInflux::new(StatusCode::OK, "<html>proxy error</html>");
    let url = serve(fake.clone()).await;
    let config = config(&url);
    let recorder = Recorder::default();
    let client = InfluxClient::new(&config.influx).unwrap();
    let publisher = Publisher::new(recorder.clone(), "ruuvi");
    let mut poller = Poller::new(client, publisher, NameMap::default(), &config)
        .with_retry_policy(fast_retries().with_attempts(2));

    assert_eq!(poller.poll_once().await, CycleOutcome::Skipped);
    assert_eq!(fake.hits(), 2);
}

#[tokio::test]
async fn test_client_reports_status_and_sends_credentials() {
    let fake = FakeInflux::new(
        StatusCode::UNAUTHORIZED,
        r#"{"error":"authorization failed"}"#,
    );
    let url = serve(fake.clone()).await;
    let mut config = config(&url);
    config.influx.username = Some("reader".to_string());
    config.influx.password = Some("secret".to_string());
    config.influx.database = "sensors".to_string();

    let client = InfluxClient::new(&config.influx).unwrap();
    let err = client.fetch().await.unwrap_err();

    match err {
        QueryError::Status { status, body } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED.as_u16());
            assert!(body.contains("authorization failed"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let (params, auth) = fake.last_request.lock().await.clone().unwrap();
    assert_eq!(params["db"], "sensors");
    assert_eq!(auth.as_deref(), Some("Basic cmVhZGVyOnNlY3JldA=="));
}

#[tokio::test]
async fn test_unreachable_influx_is_http_error() {
    let config = config("http://127.0.0.1:1");
    let client = InfluxClient::new(&config.influx).unwrap();

    assert!(matches!(client.fetch().await, Err(QueryError::Http(_))));
}
