//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet};
use tokio::signal;
use tokio::task::JoinHandle;

use ruuvi_common::{LoggingConfig, connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::status::{BridgeStatus, StatusPublisher};

/// Pause between reconnection attempts after a broker connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// How long shutdown waits for the final messages to be flushed.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - MQTT connection (with an "offline" last will)
/// - Driving the MQTT event loop in the background
/// - Task spawning and management
/// - Status publishing on startup and shutdown
/// - Graceful shutdown on Ctrl+C / SIGTERM
///
/// # Example
///
/// ```ignore
/// use ruuvi_bridge_framework::BridgeRunner;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = MyBridgeConfig::read("mybridge.json5")?;
///     let mut runner = BridgeRunner::new("mybridge", config, None).await?;
///
///     let publisher = runner.publisher();
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run_with_metadata(None).await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// The resolved configuration.
    config: C,
    /// MQTT client shared by every publisher.
    client: AsyncClient,
    /// Publisher rooted at the bridge's topic prefix.
    publisher: Publisher,
    /// Status publisher.
    status_publisher: StatusPublisher<AsyncClient>,
    /// Background task polling the MQTT event loop.
    event_loop: JoinHandle<()>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging based on config, with CLI args taking precedence
    /// 2. Connect to the MQTT broker with an "offline" last will
    /// 3. Start driving the MQTT event loop
    pub async fn new(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let mut log_config: LoggingConfig = config.logging().clone();
        if let Some(args) = args {
            if let Some(ref level) = args.log_level {
                log_config.level = level.clone();
            }
            if let Some(format) = args.log_format {
                log_config.format = format;
            }
        }

        init_tracing(&log_config)?;

        Self::start(name.into(), config).await
    }

    /// Connect and start the event loop. Tracing must already be set up.
    async fn start(name: String, config: C) -> Result<Self> {
        let version = env!("CARGO_PKG_VERSION");

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        for warning in config.warnings() {
            tracing::warn!(bridge = %name, "Configuration: {}", warning);
        }

        let last_will = BridgeStatus::offline(&name, version).last_will(config.topic_prefix())?;
        let (client, eventloop) = connect(config.mqtt(), Some(last_will)).await?;

        let event_loop = tokio::spawn(drive_event_loop(eventloop));

        let publisher = Publisher::new(client.clone(), config.topic_prefix());
        let status_publisher = StatusPublisher::new(publisher.clone(), &name, version);

        Ok(Self {
            name,
            config,
            client,
            publisher,
            status_publisher,
            event_loop,
            tasks: Vec::new(),
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C or SIGTERM is received.
    ///
    /// This will:
    /// 1. Publish "running" status with the given metadata
    /// 2. Wait for a shutdown signal
    /// 3. Abort all spawned tasks
    /// 4. Publish "offline" status
    /// 5. Disconnect from the broker
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        self.run_until(metadata, shutdown_signal()).await
    }

    async fn run_until<S>(self, metadata: Option<serde_json::Value>, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        if let Err(e) = self.status_publisher.publish_running(metadata).await {
            tracing::warn!(error = %e, "Failed to publish running status");
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        shutdown.await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        if let Err(e) = self.status_publisher.publish_offline().await {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
        }

        // Let the event loop flush the offline status and the DISCONNECT.
        let mut event_loop = self.event_loop;
        if tokio::time::timeout(FLUSH_TIMEOUT, &mut event_loop).await.is_err() {
            event_loop.abort();
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Poll the MQTT event loop until the client disconnects.
///
/// Connection errors are logged; the next poll reconnects.
async fn drive_event_loop(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
                break;
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("Reconnected to MQTT broker");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, retry_in = ?RECONNECT_DELAY, "MQTT connection error");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Resolve when the process is asked to stop.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
