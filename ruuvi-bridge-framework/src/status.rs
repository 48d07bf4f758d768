//! Bridge status reporting.

use rumqttc::{LastWill, QoS};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::{MqttTransport, Publisher};

/// Bridge status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name.
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("running", "offline").
    pub status: String,
    /// Additional metadata (bridge-specific).
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    /// Create a new status with "running" state.
    pub fn running(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: "running".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a status with "offline" state.
    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: "offline".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Publish this status, retained, to `{topic_prefix}/bridge/status`.
    pub async fn publish<T: MqttTransport>(&self, publisher: &Publisher<T>) -> Result<()> {
        let topic = ruuvi_common::topic::status_topic(publisher.topic_prefix());
        publisher.publish_json(&topic, self).await
    }

    /// Last-will message announcing this status if the connection drops.
    pub fn last_will(&self, topic_prefix: &str) -> Result<LastWill> {
        Ok(LastWill::new(
            ruuvi_common::topic::status_topic(topic_prefix),
            serde_json::to_vec(self)?,
            QoS::AtMostOnce,
            true,
        ))
    }
}

/// Helper to publish bridge status on startup and shutdown.
pub struct StatusPublisher<T> {
    publisher: Publisher<T>,
    bridge_name: String,
    version: String,
}

impl<T: MqttTransport> StatusPublisher<T> {
    /// Create a new status publisher.
    pub fn new(
        publisher: Publisher<T>,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    /// Publish "running" status with optional metadata.
    pub async fn publish_running(&self, metadata: Option<serde_json::Value>) -> Result<()> {
        let mut status = BridgeStatus::running(&self.bridge_name, &self.version);
        if let Some(meta) = metadata {
            status = status.with_metadata(meta);
        }
        status.publish(&self.publisher).await
    }

    /// Publish "offline" status.
    pub async fn publish_offline(&self) -> Result<()> {
        BridgeStatus::offline(&self.bridge_name, &self.version)
            .publish(&self.publisher)
            .await
    }
}
