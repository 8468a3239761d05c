//! In-memory simulation server.
//!
//! `SimServer` wraps `ServerDriver` with [`SimEnv`] and executes its actions
//! without sockets: every message addressed to a connection is encoded to its
//! wire form, decoded again and appended to that connection's inbox. Tests
//! drive it explicitly, one event at a time.

use std::{collections::HashMap, time::Duration};

use bingo_core::ConnectionId;
use bingo_proto::{ClientMessage, ProtocolError, ServerMessage};
use bingo_server::{
    Actions, DriverConfig, DriverError, LogLevel, ServerAction, ServerDriver, ServerEvent,
};

use crate::{SimEnv, invariants::SystemSnapshot};

/// Simulation server for deterministic tests.
pub struct SimServer {
    /// The action-based server driver
    driver: ServerDriver<SimEnv>,
    /// Shared clock and RNG
    env: SimEnv,
    /// Messages received per open connection
    inboxes: HashMap<ConnectionId, Vec<ServerMessage>>,
    /// Connections the server closed, with the reason
    closed_by_server: HashMap<ConnectionId, String>,
    /// Every log line the driver produced
    logs: Vec<(LogLevel, String)>,
}

impl Default for SimServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimServer {
    /// Server with default config and seed 0.
    pub fn new() -> Self {
        Self::with_config(0, DriverConfig::default())
    }

    /// Server with a specific seed and config.
    pub fn with_config(seed: u64, config: DriverConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let driver = ServerDriver::new(env.clone(), config);

        Self {
            driver,
            env,
            inboxes: HashMap::new(),
            closed_by_server: HashMap::new(),
            logs: Vec::new(),
        }
    }

    /// Open a connection and return its id.
    ///
    /// If the server turns it away, the id is returned anyway and
    /// [`SimServer::is_open`] is false for it.
    pub fn connect(&mut self) -> ConnectionId {
        let (connection_id, actions) = self.driver.open_connection();
        self.inboxes.insert(connection_id, Vec::new());
        self.execute_actions(actions);
        connection_id
    }

    /// Send a typed client message.
    pub fn send(&mut self, id: ConnectionId, message: &ClientMessage) -> Result<(), DriverError> {
        let text = serde_json::to_string(message)
            .map_err(|e| DriverError::Protocol(ProtocolError::Encode(e.to_string())))?;
        self.send_raw(id, &text)
    }

    /// Send a JSON value as a text frame.
    pub fn send_json(&mut self, id: ConnectionId, frame: &serde_json::Value) -> Result<(), DriverError> {
        self.send_raw(id, &frame.to_string())
    }

    /// Send a raw text frame.
    pub fn send_raw(&mut self, id: ConnectionId, text: &str) -> Result<(), DriverError> {
        let actions = self
            .driver
            .process_event(ServerEvent::FrameReceived { connection_id: id, text: text.to_string() })?;
        self.execute_actions(actions);
        Ok(())
    }

    /// Close a connection from the client side.
    pub fn disconnect(&mut self, id: ConnectionId) {
        self.inboxes.remove(&id);
        self.process(ServerEvent::ConnectionClosed {
            connection_id: id,
            reason: "client disconnect".to_string(),
        });
    }

    /// Process a tick event for reaping and sweeping.
    pub fn tick(&mut self) {
        self.process(ServerEvent::Tick);
    }

    /// Move the simulated clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
    }

    /// Drain and return a connection's inbox.
    pub fn take_inbox(&mut self, id: ConnectionId) -> Vec<ServerMessage> {
        self.inboxes.get_mut(&id).map(std::mem::take).unwrap_or_default()
    }

    /// Messages received so far, without draining.
    pub fn inbox(&self, id: ConnectionId) -> &[ServerMessage] {
        self.inboxes.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drain every inbox.
    pub fn clear_inboxes(&mut self) {
        for inbox in self.inboxes.values_mut() {
            inbox.clear();
        }
    }

    /// Whether the connection is still open from the client's point of view.
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.inboxes.contains_key(&id)
    }

    /// Reason the server closed a connection, if it did.
    pub fn close_reason(&self, id: ConnectionId) -> Option<&str> {
        self.closed_by_server.get(&id).map(String::as_str)
    }

    /// Log lines produced so far.
    pub fn logs(&self) -> &[(LogLevel, String)] {
        &self.logs
    }

    /// Access the underlying driver.
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    /// Simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Snapshot for invariant checks.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_driver(&self.driver)
    }

    fn process(&mut self, event: ServerEvent) {
        match self.driver.process_event(event) {
            Ok(actions) => self.execute_actions(actions),
            Err(e) => self.log(LogLevel::Warn, format!("event rejected: {e}")),
        }
    }

    /// Execute server actions.
    fn execute_actions(&mut self, actions: Actions<SimEnv>) {
        for action in actions {
            match action {
                ServerAction::SendToConnection { connection_id, message } => {
                    self.deliver(connection_id, &message);
                },

                ServerAction::BroadcastToRoom { room_id, message, exclude } => {
                    for connection_id in self.driver.broadcast_targets(room_id, exclude) {
                        self.deliver(connection_id, &message);
                    }
                },

                ServerAction::CloseConnection { connection_id, reason } => {
                    self.inboxes.remove(&connection_id);
                    self.closed_by_server.insert(connection_id, reason);
                },

                ServerAction::Log { level, message, .. } => {
                    self.log(level, message);
                },
            }
        }
    }

    /// Round-trip through the wire format so tests see what a client would.
    fn deliver(&mut self, connection_id: ConnectionId, message: &ServerMessage) {
        let Some(inbox) = self.inboxes.get_mut(&connection_id) else {
            return;
        };

        let decoded = bingo_proto::encode(message)
            .and_then(|text| {
                serde_json::from_str::<ServerMessage>(&text).map_err(|e| ProtocolError::Malformed {
                    kind: "server message".to_string(),
                    reason: e.to_string(),
                })
            });

        match decoded {
            Ok(message) => inbox.push(message),
            Err(e) => tracing::error!(%connection_id, "wire round-trip failed: {e}"),
        }
    }

    fn log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        self.logs.push((level, message));
    }
}

impl std::fmt::Debug for SimServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimServer")
            .field("driver", &self.driver)
            .field("open", &self.inboxes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn connect_delivers_welcome() {
        let mut server = SimServer::new();
        let id = server.connect();

        let inbox = server.take_inbox(id);
        assert!(matches!(&inbox[..], [ServerMessage::Welcome { connection_id, .. }] if *connection_id == id));
        assert!(server.take_inbox(id).is_empty());
    }

    #[test]
    fn rejected_connection_is_not_open() {
        let config = DriverConfig { max_connections: 1, ..Default::default() };
        let mut server = SimServer::with_config(0, config);

        let accepted = server.connect();
        let rejected = server.connect();

        assert!(server.is_open(accepted));
        assert!(!server.is_open(rejected));
        assert!(server.close_reason(rejected).is_some());
    }

    #[test]
    fn same_seed_gives_same_room_ids() {
        let run = |seed| {
            let mut server = SimServer::with_config(seed, DriverConfig::default());
            let id = server.connect();
            server.send_json(id, &json!({"type": "createRoom", "gameType": "75ball"})).unwrap();
            server.take_inbox(id).pop()
        };

        assert_eq!(run(7), run(7));
    }

    #[test]
    fn logs_are_recorded() {
        let mut server = SimServer::new();
        let id = server.connect();
        server.send_raw(id, "garbage").unwrap();

        assert!(server.logs().iter().any(|(level, _)| *level == LogLevel::Warn));
    }
}
