use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, LastWill, MqttOptions,
    Packet,
};

use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Capacity of the client's outgoing request channel.
const REQUEST_CAPACITY: usize = 64;

/// Build the client options for a broker connection.
pub fn mqtt_options(config: &MqttConfig, last_will: Option<LastWill>) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);

    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    if let Some(will) = last_will {
        options.set_last_will(will);
    }

    options
}

/// Connect to the MQTT broker and wait for its CONNACK.
///
/// Returns the client together with its event loop; the caller must keep
/// polling the event loop for publishes to make progress. A refused or
/// unreachable broker is reported as an error instead of being retried.
pub async fn connect(
    config: &MqttConfig,
    last_will: Option<LastWill>,
) -> Result<(AsyncClient, EventLoop)> {
    tracing::info!(
        broker = %config.address(),
        client_id = %config.client_id,
        authenticated = config.username.is_some(),
        "Connecting to MQTT broker"
    );

    let (client, mut eventloop) =
        AsyncClient::new(mqtt_options(config, last_will), REQUEST_CAPACITY);

    tokio::time::timeout(config.connect_timeout, await_connack(&mut eventloop))
        .await
        .map_err(|_| Error::ConnectTimeout(config.connect_timeout))??;

    tracing::info!(broker = %config.address(), "Connected to MQTT broker");

    Ok((client, eventloop))
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(Error::Refused(ack.code));
            }
            Ok(event) => tracing::trace!(?event, "MQTT handshake event"),
            Err(ConnectionError::ConnectionRefused(code)) => return Err(Error::Refused(code)),
            Err(e) => return Err(e.into()),
        }
    }
}
