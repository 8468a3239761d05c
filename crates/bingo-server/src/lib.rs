//! Bingo relay server.
//!
//! Lets players share a bingo room (membership, host, called numbers) over
//! WebSocket and forwards WebRTC signaling between them.
//!
//! # Architecture
//!
//! [`ServerDriver`] follows the Sans-IO pattern: it takes [`ServerEvent`]s and
//! returns [`ServerAction`]s without touching a socket or a clock directly
//! (time and randomness come from [`bingo_core::env::Environment`]). [`Server`]
//! is the production runtime that feeds it from axum WebSocket connections and
//! executes the actions it returns.
//!
//! # Components
//!
//! - [`ServerDriver`]: Router and authority rules (pure logic, no I/O)
//! - [`ConnectionRegistry`]: Live connections and their ephemeral identities
//! - [`RoomManager`]: Room store and host authority
//! - [`relay()`]: Signaling pass-through
//! - [`Server`]: Production runtime (axum, Tokio)
//! - [`SystemEnv`]: Production environment (real time, OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod registry;
mod relay;
mod room_manager;
mod server_error;
mod system_env;
mod transport;

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use axum::extract::ws::Utf8Bytes;
use bingo_core::ConnectionId;
pub use driver::{
    Actions, DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent, ServerStats,
};
pub use error::ServerError;
pub use registry::{Connection, ConnectionRegistry, Profile};
pub use relay::{RelayError, relay};
pub use room_manager::{
    GamePhase, HostSelection, Room, RoomError, RoomEvent, RoomManager, RoomPolicy, RoomSnapshot,
};
pub use server_error::DriverError;
pub use system_env::SystemEnv;
use tokio::{
    net::TcpListener,
    sync::{Mutex, RwLock, mpsc},
    time::MissedTickBehavior,
};

/// Something queued for a connection's socket writer.
#[derive(Debug, Clone)]
enum Outbound {
    /// Encoded server message
    Text(Utf8Bytes),
    /// Send a close frame and stop writing
    Close(String),
}

/// Shared state for all connections.
///
/// Lock order is driver first, then `outbound`. Actions are executed while
/// the driver lock is held so broadcasts resolve against the membership the
/// event produced.
struct SharedState {
    /// The action-based server driver
    driver: Mutex<ServerDriver<SystemEnv>>,
    /// Connection ID → queue drained by that socket's writer task.
    /// All messages to a client go through this single queue, ensuring
    /// ordering.
    outbound: RwLock<HashMap<ConnectionId, mpsc::Sender<Outbound>>>,
    /// Per-connection queue length
    outbound_buffer: usize,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// How often the driver is ticked for reaping and idle-room sweeps
    pub tick_interval: Duration,
    /// Messages buffered per connection before new ones are dropped
    pub outbound_buffer: usize,
    /// Driver configuration (limits, grace periods, host hand-off)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tick_interval: Duration::from_secs(1),
            outbound_buffer: 256,
            driver: DriverConfig::default(),
        }
    }
}

impl ServerRuntimeConfig {
    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        let driver = &self.driver;
        if driver.max_capacity == 0 {
            return Err(ServerError::Config("max capacity must be at least 1".to_string()));
        }
        if driver.default_capacity == 0 || driver.default_capacity > driver.max_capacity {
            return Err(ServerError::Config(format!(
                "default capacity must be between 1 and {}",
                driver.max_capacity
            )));
        }
        if self.outbound_buffer == 0 {
            return Err(ServerError::Config("outbound buffer must be at least 1".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(ServerError::Config("tick interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Production bingo server.
///
/// Wraps `ServerDriver` with an axum WebSocket endpoint and system environment.
pub struct Server {
    /// Bound listener
    listener: TcpListener,
    /// Driver and per-connection queues
    state: Arc<SharedState>,
    /// Tick period
    tick_interval: Duration,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_address).await?;
        let driver = ServerDriver::new(SystemEnv::new(), config.driver);
        let state = Arc::new(SharedState {
            driver: Mutex::new(driver),
            outbound: RwLock::new(HashMap::new()),
            outbound_buffer: config.outbound_buffer,
        });

        Ok(Self { listener, state, tick_interval: config.tick_interval })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// This method runs until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, "server starting");

        let ticker = tokio::spawn(tick_loop(Arc::clone(&self.state), self.tick_interval));
        let result = axum::serve(self.listener, transport::router(self.state)).await;
        ticker.abort();

        result.map_err(ServerError::from)
    }
}

/// Feed `Tick` to the driver on a fixed period.
async fn tick_loop(state: Arc<SharedState>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let mut driver = state.driver.lock().await;
        match driver.process_event(ServerEvent::Tick) {
            Ok(actions) => execute_actions(&driver, actions, &state.outbound).await,
            Err(e) => tracing::error!("tick failed: {e}"),
        }
    }
}

/// Execute server actions.
async fn execute_actions(
    driver: &ServerDriver<SystemEnv>,
    actions: Actions<SystemEnv>,
    outbound: &RwLock<HashMap<ConnectionId, mpsc::Sender<Outbound>>>,
) {
    let outbound = outbound.read().await;

    for action in actions {
        match action {
            ServerAction::SendToConnection { connection_id, message } => {
                match bingo_proto::encode(&message) {
                    Ok(text) => deliver(&outbound, connection_id, Outbound::Text(text.into())),
                    Err(e) => tracing::error!(%connection_id, "failed to encode message: {e}"),
                }
            },

            ServerAction::BroadcastToRoom { room_id, message, exclude } => {
                let text: Utf8Bytes = match bingo_proto::encode(&message) {
                    Ok(text) => text.into(),
                    Err(e) => {
                        tracing::error!(%room_id, "failed to encode broadcast: {e}");
                        continue;
                    },
                };

                for connection_id in driver.broadcast_targets(room_id, exclude) {
                    deliver(&outbound, connection_id, Outbound::Text(text.clone()));
                }
            },

            ServerAction::CloseConnection { connection_id, reason } => {
                tracing::info!(%connection_id, "closing connection: {reason}");
                deliver(&outbound, connection_id, Outbound::Close(reason));
            },

            ServerAction::Log { level, message, .. } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}

/// Queue a message without waiting. A full queue drops the message.
fn deliver(
    outbound: &HashMap<ConnectionId, mpsc::Sender<Outbound>>,
    connection_id: ConnectionId,
    item: Outbound,
) {
    match outbound.get(&connection_id) {
        Some(tx) => {
            if let Err(e) = tx.try_send(item) {
                tracing::warn!(%connection_id, "dropping outbound message: {e}");
            }
        },
        None => tracing::debug!(%connection_id, "no outbound queue; connection already gone"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerRuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_capacities() {
        let mut config = ServerRuntimeConfig::default();
        config.driver.default_capacity = 200;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        config.driver.default_capacity = 0;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        let mut config = ServerRuntimeConfig::default();
        config.driver.max_capacity = 0;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_buffer_and_tick() {
        let config = ServerRuntimeConfig { outbound_buffer: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = ServerRuntimeConfig { tick_interval: Duration::ZERO, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
