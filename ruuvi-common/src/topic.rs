/// Default prefix for device state topics.
pub const DEFAULT_TOPIC_PREFIX: &str = "ruuvi";

/// Default Home Assistant discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Builder for the bridge's MQTT topics.
///
/// Topics follow the patterns:
/// - state: `<topic_prefix>/<device_name>`
/// - discovery: `<discovery_prefix>/<component>/<object_id>/config`
/// - status: `<topic_prefix>/bridge/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    topic_prefix: String,
    discovery_prefix: String,
}

impl Default for TopicBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX, DEFAULT_DISCOVERY_PREFIX)
    }
}

impl TopicBuilder {
    /// Create a builder from the state and discovery prefixes.
    ///
    /// Trailing slashes are stripped so `ruuvi/` and `ruuvi` build the same topics.
    pub fn new(topic_prefix: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            topic_prefix: trim_prefix(topic_prefix.into()),
            discovery_prefix: trim_prefix(discovery_prefix.into()),
        }
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    /// Topic carrying the JSON readings of one device.
    ///
    /// # Example
    /// ```
    /// use ruuvi_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::default();
    /// assert_eq!(topics.state_topic("Kitchen"), "ruuvi/Kitchen");
    /// ```
    pub fn state_topic(&self, device_name: &str) -> String {
        format!("{}/{}", self.topic_prefix, device_name)
    }

    /// Home Assistant discovery config topic for one entity.
    ///
    /// # Example
    /// ```
    /// use ruuvi_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::default();
    /// assert_eq!(
    ///     topics.discovery_topic("sensor", "ruuvi_Kitchen_temperature"),
    ///     "homeassistant/sensor/ruuvi_Kitchen_temperature/config"
    /// );
    /// ```
    pub fn discovery_topic(&self, component: &str, object_id: &str) -> String {
        format!("{}/{}/{}/config", self.discovery_prefix, component, object_id)
    }

    /// Topic carrying the bridge's own status.
    ///
    /// # Example
    /// ```
    /// use ruuvi_common::topic::TopicBuilder;
    ///
    /// assert_eq!(TopicBuilder::default().status_topic(), "ruuvi/bridge/status");
    /// ```
    pub fn status_topic(&self) -> String {
        status_topic(&self.topic_prefix)
    }
}

/// Status topic under an arbitrary prefix.
pub fn status_topic(topic_prefix: &str) -> String {
    format!("{}/bridge/status", topic_prefix.trim_end_matches('/'))
}

/// Turn a display name into a token usable inside identifiers.
///
/// Spaces become underscores; everything else is kept verbatim.
///
/// # Example
/// ```
/// use ruuvi_common::topic::object_token;
///
/// assert_eq!(object_token("Living Room"), "Living_Room");
/// assert_eq!(object_token("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
/// ```
pub fn object_token(name: &str) -> String {
    name.replace(' ', "_")
}

fn trim_prefix(prefix: String) -> String {
    prefix.trim_end_matches('/').to_string()
}
