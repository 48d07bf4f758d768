//! Retained MQTT publisher.

use std::future::Future;
use std::pin::Pin;

use rumqttc::{AsyncClient, ClientError, QoS};

use crate::error::{BridgeError, Result};

/// Boxed `Send` future returned by the transport and source traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outgoing side of an MQTT connection.
///
/// Implemented for [`rumqttc::AsyncClient`]; tests substitute an in-memory
/// recorder.
pub trait MqttTransport: Clone + Send + Sync + 'static {
    /// Queue one message for publishing.
    fn publish(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> BoxFuture<'_, std::result::Result<(), ClientError>>;
}

impl MqttTransport for AsyncClient {
    fn publish(
        &self,
        topic: String,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> BoxFuture<'_, std::result::Result<(), ClientError>> {
        Box::pin(AsyncClient::publish(self, topic, qos, retain, payload))
    }
}

/// Publisher for sending retained messages to the broker.
///
/// Every message goes out with QoS 0 (at most once) and the retain flag set,
/// so late subscribers immediately see the latest state.
#[derive(Clone, Debug)]
pub struct Publisher<T = AsyncClient> {
    transport: T,
    topic_prefix: String,
}

impl<T: MqttTransport> Publisher<T> {
    /// Create a new publisher.
    pub fn new(transport: T, topic_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            topic_prefix: topic_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the topic prefix.
    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    /// Publish raw bytes to a full topic.
    pub async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.transport
            .publish(topic.to_string(), QoS::AtMostOnce, true, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    /// Publish a JSON value to a full topic.
    pub async fn publish_json<V: serde::Serialize>(&self, topic: &str, value: &V) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(topic, payload).await
    }

    /// Publish a batch of JSON messages to full topics.
    ///
    /// Failures are logged and counted, never retried.
    pub async fn publish_batch<V>(&self, messages: Vec<(String, V)>) -> PublishStats
    where
        V: serde::Serialize,
    {
        let mut stats = PublishStats::default();

        for (topic, value) in messages {
            let sent = match serde_json::to_vec(&value) {
                Ok(payload) => self.publish_raw(&topic, payload).await,
                Err(e) => Err(e.into()),
            };

            match sent {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(topic = %topic, error = %e, "Failed to publish message");
                }
            }
        }

        stats
    }
}

/// Statistics from a batch publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully published messages.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}
