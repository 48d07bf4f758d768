//! Poll loop: query, retry, republish, sleep.

use std::collections::BTreeSet;
use std::time::Duration;

use rumqttc::AsyncClient;

use ruuvi_bridge_framework::{MqttTransport, PublishStats, Publisher, RetryPolicy, retry};
use ruuvi_common::{DeviceReadings, ReadingSet, TopicBuilder};

use crate::config::RuuviBridgeConfig;
use crate::discovery;
use crate::influx::ReadingSource;
use crate::names::NameMap;

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The query succeeded and every device's readings were published.
    Published {
        devices: usize,
        stats: PublishStats,
    },
    /// Every query attempt failed; nothing was published.
    Skipped,
}

/// Periodically republishes the latest readings of every device.
pub struct Poller<S, T = AsyncClient> {
    source: S,
    publisher: Publisher<T>,
    topics: TopicBuilder,
    names: NameMap,
    retry: RetryPolicy,
    interval: Duration,
    /// Display names whose discovery configs have been sent.
    announced: BTreeSet<String>,
}

impl<S, T> Poller<S, T>
where
    S: ReadingSource,
    T: MqttTransport,
{
    pub fn new(
        source: S,
        publisher: Publisher<T>,
        names: NameMap,
        config: &RuuviBridgeConfig,
    ) -> Self {
        Self {
            source,
            publisher,
            topics: config.topics(),
            names,
            retry: config.retry_policy(),
            interval: config.bridge.scrape_interval,
            announced: BTreeSet::new(),
        }
    }

    /// Replace the retry policy derived from the configuration.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Announce every mapped device, then poll forever.
    pub async fn run(mut self) {
        tracing::info!(
            interval = ?self.interval,
            max_attempts = self.retry.max_attempts,
            "Starting poll loop"
        );

        let display_names: Vec<String> = self
            .names
            .devices()
            .map(|(_, name)| name.to_string())
            .collect();
        self.announce(display_names).await;

        loop {
            self.poll_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Publish discovery configs for devices not announced yet.
    pub async fn announce(&mut self, display_names: Vec<String>) -> PublishStats {
        let mut pending = display_names;
        pending.sort();
        pending.dedup();
        pending.retain(|name| !self.announced.contains(name));

        if pending.is_empty() {
            return PublishStats::default();
        }

        let configs = discovery::build_configs(&pending, &self.topics);
        let stats = discovery::announce(&self.publisher, configs).await;
        self.announced.extend(pending);
        stats
    }

    /// Run one cycle: query with retries, then publish each device's readings.
    pub async fn poll_once(&mut self) -> CycleOutcome {
        let readings = match retry(self.retry, "InfluxDB query", || self.source.latest()).await {
            Ok(readings) => readings,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    last_error = %e.last_error,
                    next_poll = ?self.interval,
                    "Skipping poll cycle"
                );
                return CycleOutcome::Skipped;
            }
        };

        let devices = readings.len();
        tracing::debug!(devices, "Retrieved readings from InfluxDB");

        // Devices missing from the name mapping are announced when first seen.
        let seen: Vec<String> = readings
            .keys()
            .map(|id| self.names.display_name(id).to_string())
            .collect();
        self.announce(seen).await;

        let stats = self.publish_readings(readings).await;

        tracing::info!(
            devices,
            published = stats.success,
            failed = stats.failed,
            "Published readings"
        );

        CycleOutcome::Published { devices, stats }
    }

    async fn publish_readings(&self, readings: ReadingSet) -> PublishStats {
        let messages: Vec<(String, DeviceReadings)> = readings
            .into_iter()
            .map(|(id, fields)| (self.topics.state_topic(self.names.display_name(&id)), fields))
            .collect();

        self.publisher.publish_batch(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influx::{InfluxClient, QueryError};
    use std::future::Future;
    use rumqttc::{ClientError, QoS};
    use ruuvi_bridge_framework::BoxFuture;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        messages: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    impl Recorder {
        async fn topics(&self) -> Vec<String> {
            self.messages
                .lock()
                .await
                .iter()
                .map(|(topic, _)| topic.clone())
                .collect()
        }
    }

    impl MqttTransport for Recorder {
        fn publish(
            &self,
            topic: String,
            _qos: QoS,
            _retain: bool,
            payload: Vec<u8>,
        ) -> BoxFuture<'_, Result<(), ClientError>> {
            Box::pin(async move {
                self.messages.lock().await.push((topic, payload));
                Ok(())
            })
        }
    }

    #[derive(Clone, Default)]
    struct FakeSource {
        readings: ReadingSet,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ReadingSource for FakeSource {
        fn latest(&self) -> BoxFuture<'_, Result<ReadingSet, QueryError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(QueryError::Influx("database unavailable".to_string()))
            } else {
                Ok(self.readings.clone())
            };
            Box::pin(async move { result })
        }
    }

    fn readings(devices: &[(&str, f64)]) -> ReadingSet {
        devices
            .iter()
            .map(|(id, temperature)| {
                let fields = [("temperature".to_string(), json!(temperature))]
                    .into_iter()
                    .collect();
                (id.to_string(), fields)
            })
            .collect()
    }

    fn poller(
        source: FakeSource,
        names: NameMap,
        recorder: &Recorder,
    ) -> Poller<FakeSource, Recorder> {
        let config = RuuviBridgeConfig::default();
        Poller::new(
            source,
            Publisher::new(recorder.clone(), config.bridge.topic_prefix.clone()),
            names,
            &config,
        )
    }

    #[tokio::test]
    async fn test_publishes_one_message_per_device() {
        let recorder = Recorder::default();
        let names = NameMap::parse("aa:bb:cc:dd:ee:ff=Kitchen");
        let source = FakeSource {
            readings: readings(&[("aa:bb:cc:dd:ee:ff", 21.5), ("11:22:33:44:55:66", 4.0)]),
            ..FakeSource::default()
        };
        let mut poller = poller(source, names, &recorder);
        poller.announced.insert("Kitchen".to_string());
        poller.announced.insert("11:22:33:44:55:66".to_string());

        let outcome = poller.poll_once().await;

        assert_eq!(
            outcome,
            CycleOutcome::Published {
                devices: 2,
                stats: PublishStats {
                    success: 2,
                    failed: 0
                }
            }
        );
        let messages = recorder.messages.lock().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, "ruuvi/11:22:33:44:55:66");
        assert_eq!(messages[1].0, "ruuvi/Kitchen");
        assert_eq!(messages[1].1.as_slice(), br#"{"temperature":21.5}"#);
    }

    #[tokio::test]
    async fn test_empty_result_publishes_nothing() {
        let recorder = Recorder::default();
        let mut poller = poller(FakeSource::default(), NameMap::default(), &recorder);

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
    async fn test_unmapped_device_announced_once() {
        let recorder = Recorder::default();
        let source = FakeSource {
            readings: readings(&[("aa:bb", 1.0)]),
            ..FakeSource::default()
        };
        let mut poller = poller(source, NameMap::default(), &recorder);

        poller.poll_once().await;
        poller.poll_once().await;

        let topics = recorder.topics().await;
        let discovery: Vec<_> = topics
            .iter()
            .filter(|t| t.starts_with("homeassistant/"))
            .collect();
        assert_eq!(discovery.len(), ruuvi_common::FIELDS.len());
        assert!(
            discovery
                .iter()
                .any(|t| *t == "homeassistant/sensor/ruuvi_aa:bb_temperature/config")
        );
        assert_eq!(topics.iter().filter(|t| *t == "ruuvi/aa:bb").count(), 2);
    }

    #[tokio::test]
    async fn test_announce_skips_known_names() {
        let recorder = Recorder::default();
        let mut poller = poller(FakeSource::default(), NameMap::default(), &recorder);

        let first = poller
            .announce(vec!["Kitchen".to_string(), "Kitchen".to_string()])
            .await;
        let second = poller.announce(vec!["Kitchen".to_string()]).await;

        assert_eq!(first.success, ruuvi_common::FIELDS.len());
        assert_eq!(second, PublishStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_is_skipped() {
        let recorder = Recorder::default();
        let source = FakeSource {
            fail: true,
            ..FakeSource::default()
        };
        let calls = source.calls.clone();
        let mut poller = poller(source, NameMap::default(), &recorder);

        let outcome = poller.poll_once().await;

        assert_eq!(outcome, CycleOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(recorder.messages.lock().await.is_empty());
    }

    #[test]
    fn test_poll_loop_can_be_spawned() {
        fn assert_send<F: Future<Output = ()> + Send + 'static>(_: F) {}

        let config = RuuviBridgeConfig::default();
        let influx = InfluxClient::new(&config.influx).unwrap();
        let (client, _eventloop) =
            AsyncClient::new(ruuvi_common::mqtt_options(&config.mqtt, None), 8);
        let publisher = Publisher::new(client, config.bridge.topic_prefix.clone());

        assert_send(Poller::new(influx, publisher, NameMap::default(), &config).run());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_resumes_after_poll_interval() {
        let recorder = Recorder::default();
        let source = FakeSource {
            fail: true,
            ..FakeSource::default()
        };
        let calls = source.calls.clone();
        let handle = tokio::spawn(poller(source, NameMap::default(), &recorder).run());

        // Attempts at 0, 1, 3, 7 and 15 s; the last backoff ends at 31 s and
        // the next cycle starts one 5 s poll interval later.
        tokio::time::sleep(Duration::from_millis(35_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 6);

        handle.abort();
        assert!(recorder.messages.lock().await.is_empty());
    }
}
