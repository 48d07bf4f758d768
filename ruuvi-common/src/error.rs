use thiserror::Error;

/// Common error type for the bridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MQTT connection error: {0}")]
    Mqtt(#[from] rumqttc::ConnectionError),

    #[error("MQTT broker refused connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    #[error("Timed out after {0:?} waiting for MQTT broker")]
    ConnectTimeout(std::time::Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid duration '{input}': {reason}")]
    Duration { input: String, reason: String },
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
