use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use serde_json::Value;

/// Static metadata for one tracked RuuviTag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field (column) name in the time-series store.
    pub name: &'static str,
    /// Physical unit, if the field has one.
    pub unit: Option<&'static str>,
    /// Home Assistant device class, if one applies.
    pub device_class: Option<&'static str>,
    /// Material Design icon shown by the hub.
    pub icon: Option<&'static str>,
}

impl FieldSpec {
    const fn new(
        name: &'static str,
        unit: Option<&'static str>,
        device_class: Option<&'static str>,
        icon: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            unit,
            device_class,
            icon,
        }
    }
}

/// Every field the bridge queries and announces, in query order.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("temperature", Some("°C"), Some("temperature"), None),
    FieldSpec::new("humidity", Some("%"), Some("humidity"), None),
    FieldSpec::new("pressure", Some("hPa"), Some("pressure"), None),
    FieldSpec::new("battery", Some("V"), Some("battery"), None),
    FieldSpec::new("rssi", Some("dBm"), Some("signal_strength"), None),
    FieldSpec::new("dewPoint", Some("°C"), Some("temperature"), None),
    FieldSpec::new("accelX", Some("g"), None, Some("mdi:axis-x-arrow")),
    FieldSpec::new("accelY", Some("g"), None, Some("mdi:axis-y-arrow")),
    FieldSpec::new("accelZ", Some("g"), None, Some("mdi:axis-z-arrow")),
    FieldSpec::new("movementCounter", Some("count"), Some("motion"), None),
    FieldSpec::new("accelAngleX", Some("°"), None, Some("mdi:rotate-left")),
    FieldSpec::new("accelAngleY", Some("°"), None, Some("mdi:rotate-left")),
    FieldSpec::new("accelAngleZ", Some("°"), None, Some("mdi:rotate-left")),
    FieldSpec::new("accelTotal", Some("g"), None, Some("mdi:vibrate")),
    FieldSpec::new("accelStatus", None, None, Some("mdi:information")),
    FieldSpec::new("accelMotion", None, None, Some("mdi:run-fast")),
    FieldSpec::new("accelCounter", Some("count"), Some("counter"), None),
    FieldSpec::new("accelSequence", None, None, Some("mdi:format-list-numbered")),
    FieldSpec::new("accelTimestamp", Some("s"), None, Some("mdi:clock-outline")),
    FieldSpec::new("accelRawX", Some("g"), None, Some("mdi:axis-x-arrow")),
    FieldSpec::new("accelRawY", Some("g"), None, Some("mdi:axis-y-arrow")),
    FieldSpec::new("accelRawZ", Some("g"), None, Some("mdi:axis-z-arrow")),
    FieldSpec::new("accelRawTotal", Some("g"), None, Some("mdi:vibrate")),
    FieldSpec::new("accelRawStatus", None, None, Some("mdi:information")),
    FieldSpec::new("accelRawMotion", None, None, Some("mdi:run-fast")),
    FieldSpec::new("accelRawCounter", Some("count"), Some("counter"), None),
    FieldSpec::new("accelRawSequence", None, None, Some("mdi:format-list-numbered")),
    FieldSpec::new("accelRawTimestamp", Some("s"), None, Some("mdi:clock-outline")),
];

static FIELD_INDEX: LazyLock<HashMap<&'static str, &'static FieldSpec>> =
    LazyLock::new(|| FIELDS.iter().map(|spec| (spec.name, spec)).collect());

/// Look up a field's metadata by name.
///
/// # Example
/// ```
/// use ruuvi_common::telemetry::field_spec;
///
/// let spec = field_spec("rssi").unwrap();
/// assert_eq!(spec.unit, Some("dBm"));
/// assert_eq!(spec.device_class, Some("signal_strength"));
/// assert!(field_spec("co2").is_none());
/// ```
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELD_INDEX.get(name).copied()
}

/// Latest value of each field for one device, keyed by field name.
///
/// Values are whatever the store returned (numbers, strings, booleans or
/// null). A `BTreeMap` keeps the published JSON keys in a stable order.
pub type DeviceReadings = BTreeMap<String, Value>;

/// Readings of one poll cycle, keyed by device identifier.
pub type ReadingSet = BTreeMap<String, DeviceReadings>;
