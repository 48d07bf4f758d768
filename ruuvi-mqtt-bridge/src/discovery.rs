//! Home Assistant MQTT discovery.
//!
//! Every (field, device) pair is announced as a `sensor` entity whose state is
//! extracted from the device's JSON state message.

use serde::Serialize;

use ruuvi_bridge_framework::{MqttTransport, PublishStats, Publisher};
use ruuvi_common::{FIELDS, FieldSpec, TopicBuilder, object_token};

const COMPONENT: &str = "sensor";
const ID_PREFIX: &str = "ruuvi";

/// Discovery payload for one sensor entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryConfig {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub value_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    pub device: DeviceInfo,
}

/// Device the entity is grouped under in Home Assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

impl DiscoveryConfig {
    /// Build the config of one field for a device shown as `display_name`.
    pub fn new(field: &FieldSpec, display_name: &str, topics: &TopicBuilder) -> Self {
        let base_id = object_token(display_name);

        Self {
            name: format!("{} {}", display_name, title_case(field.name)),
            unique_id: format!("{}_{}_{}", ID_PREFIX, base_id, field.name),
            state_topic: topics.state_topic(display_name),
            value_template: format!("{{{{ value_json.{} }}}}", field.name),
            unit_of_measurement: field.unit.filter(|unit| !unit.is_empty()),
            device_class: field.device_class.filter(|class| !class.is_empty()),
            icon: field.icon.filter(|icon| !icon.is_empty()),
            device: DeviceInfo {
                identifiers: vec![format!("{}_{}", ID_PREFIX, base_id)],
                name: display_name.to_string(),
                manufacturer: "Ruuvi",
                model: "RuuviTag",
            },
        }
    }

    /// Topic this config is published on.
    pub fn topic(&self, topics: &TopicBuilder) -> String {
        topics.discovery_topic(COMPONENT, &self.unique_id)
    }
}

/// Upper-case the first letter of a field name.
fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build `(topic, config)` for every field of every named device.
///
/// Fields form the outer loop, devices the inner one, so the output order only
/// depends on the inputs.
pub fn build_configs<S: AsRef<str>>(
    display_names: &[S],
    topics: &TopicBuilder,
) -> Vec<(String, DiscoveryConfig)> {
    let mut configs = Vec::with_capacity(FIELDS.len() * display_names.len());

    for field in FIELDS {
        for name in display_names {
            let config = DiscoveryConfig::new(field, name.as_ref(), topics);
            configs.push((config.topic(topics), config));
        }
    }

    configs
}

/// Publish discovery configs, retained.
pub async fn announce<T: MqttTransport>(
    publisher: &Publisher<T>,
    configs: Vec<(String, DiscoveryConfig)>,
) -> PublishStats {
    let stats = publisher.publish_batch(configs).await;

    tracing::info!(
        published = stats.success,
        failed = stats.failed,
        "Sent Home Assistant discovery configs"
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruuvi_common::field_spec;

    #[test]
    fn test_kitchen_temperature() {
        let topics = TopicBuilder::default();
        let config = DiscoveryConfig::new(field_spec("temperature").unwrap(), "Kitchen", &topics);

        assert_eq!(config.name, "Kitchen Temperature");
        assert_eq!(config.unique_id, "ruuvi_Kitchen_temperature");
        assert_eq!(config.state_topic, "ruuvi/Kitchen");
        assert_eq!(config.value_template, "{{ value_json.temperature }}");
        assert_eq!(config.unit_of_measurement, Some("°C"));
        assert_eq!(config.device_class, Some("temperature"));
        assert_eq!(config.icon, None);
        assert_eq!(config.device.identifiers, vec!["ruuvi_Kitchen"]);
        assert_eq!(
            config.topic(&topics),
            "homeassistant/sensor/ruuvi_Kitchen_temperature/config"
        );
    }

    #[test]
    fn test_serialized_payload() {
        let topics = TopicBuilder::default();
        let config = DiscoveryConfig::new(field_spec("accelStatus").unwrap(), "Kitchen", &topics);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"name":"Kitchen AccelStatus","unique_id":"ruuvi_Kitchen_accelStatus","#,
                r#""state_topic":"ruuvi/Kitchen","value_template":"{{ value_json.accelStatus }}","#,
                r#""icon":"mdi:information","#,
                r#""device":{"identifiers":["ruuvi_Kitchen"],"name":"Kitchen","#,
                r#""manufacturer":"Ruuvi","model":"RuuviTag"}}"#
            )
        );
    }

    #[test]
    fn test_spaces_in_name() {
        let topics = TopicBuilder::default();
        let config = DiscoveryConfig::new(field_spec("humidity").unwrap(), "Living Room", &topics);

        assert_eq!(config.name, "Living Room Humidity");
        assert_eq!(config.unique_id, "ruuvi_Living_Room_humidity");
        assert_eq!(config.state_topic, "ruuvi/Living Room");
        assert_eq!(config.device.identifiers, vec!["ruuvi_Living_Room"]);
    }

    #[test]
    fn test_identifier_used_verbatim() {
        let topics = TopicBuilder::default();
        let config =
            DiscoveryConfig::new(field_spec("rssi").unwrap(), "aa:bb:cc:dd:ee:ff", &topics);

        assert_eq!(config.unique_id, "ruuvi_aa:bb:cc:dd:ee:ff_rssi");
        assert_eq!(config.state_topic, "ruuvi/aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_cross_product_order() {
        let topics = TopicBuilder::default();
        let configs = build_configs(&["Kitchen", "Sauna"], &topics);

        assert_eq!(configs.len(), FIELDS.len() * 2);
        assert_eq!(configs[0].1.unique_id, "ruuvi_Kitchen_temperature");
        assert_eq!(configs[1].1.unique_id, "ruuvi_Sauna_temperature");
        assert_eq!(configs[2].1.unique_id, "ruuvi_Kitchen_humidity");
    }

    #[test]
    fn test_generation_is_idempotent() {
        let topics = TopicBuilder::new("home/ruuvi", "ha");
        let render = || {
            build_configs(&["Kitchen", "aa:bb"], &topics)
                .into_iter()
                .map(|(topic, config)| (topic, serde_json::to_vec(&config).unwrap()))
                .collect::<Vec<_>>()
        };

        assert_eq!(render(), render());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("dewPoint"), "DewPoint");
        assert_eq!(title_case("rssi"), "Rssi");
        assert_eq!(title_case(""), "");
    }
}
