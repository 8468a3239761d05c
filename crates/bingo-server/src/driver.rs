//! Server driver.
//!
//! Ties together the connection registry, the room manager (host authority and
//! game state) and the signaling relay. Every inbound socket event goes through
//! [`ServerDriver::process_event`] and comes back as a list of
//! [`ServerAction`]s for the runtime to execute. No I/O happens here.

use std::time::Duration;

use bingo_core::{ConnectionId, RoomId, env::Environment};
use bingo_proto::{ClientMessage, PlayerInfo, ServerMessage, SignalKind};
use serde::Serialize;
use serde_json::Value;

use crate::{
    registry::{ConnectionRegistry, Profile},
    relay,
    room_manager::{HostSelection, RoomError, RoomEvent, RoomManager, RoomPolicy},
    server_error::DriverError,
};

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Capacity used when `createRoom` does not ask for one
    pub default_capacity: usize,
    /// Largest capacity a creator may ask for
    pub max_capacity: usize,
    /// How long a closed connection's record is kept before it is reaped
    pub reap_grace: Duration,
    /// Age after which an empty room is swept
    pub room_max_age: Duration,
    /// Host hand-off rule
    pub host_selection: HostSelection,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            default_capacity: 100,
            max_capacity: 100,
            reap_grace: Duration::from_secs(30),
            room_max_age: Duration::from_secs(600),
            host_selection: HostSelection::EarliestJoined,
        }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
/// New sockets go through [`ServerDriver::open_connection`] instead, since the
/// runtime needs the assigned id back.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A text frame arrived on a connection
    FrameReceived {
        /// Connection that sent the frame
        connection_id: ConnectionId,
        /// Raw frame contents
        text: String,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        connection_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Periodic tick for reaping and idle-room sweeps
    Tick,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone)]
pub enum ServerAction<I> {
    /// Send a message to one connection
    SendToConnection {
        /// Target connection
        connection_id: ConnectionId,
        /// Message to send
        message: ServerMessage,
    },

    /// Send a message to every connected member of a room
    BroadcastToRoom {
        /// Target room
        room_id: RoomId,
        /// Message to broadcast
        message: ServerMessage,
        /// Optional connection to leave out
        exclude: Option<ConnectionId>,
    },

    /// Close a connection
    CloseConnection {
        /// Connection to close
        connection_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: I,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Actions produced for a single event.
pub type Actions<E> = Vec<ServerAction<<E as Environment>::Instant>>;

/// Point-in-time counters served on the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Open connections
    pub connections: usize,
    /// Active rooms
    pub rooms: usize,
    /// Connections that are in a room
    pub players: usize,
}

/// Action-based server driver.
///
/// Orchestrates connection tracking, room operations and message routing.
pub struct ServerDriver<E: Environment> {
    /// Connection records
    registry: ConnectionRegistry<E::Instant>,
    /// Rooms, host authority, called numbers
    room_manager: RoomManager<E::Instant>,
    /// Environment (time, RNG)
    env: E,
    /// Driver configuration
    config: DriverConfig,
}

impl<E: Environment> ServerDriver<E> {
    /// Create a new server driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        let policy = RoomPolicy {
            max_capacity: config.max_capacity,
            host_selection: config.host_selection,
        };

        Self {
            registry: ConnectionRegistry::new(),
            room_manager: RoomManager::new(policy),
            env,
            config,
        }
    }

    /// Accept a new socket.
    ///
    /// Returns the id assigned to it and the actions to run: a `welcome` for
    /// the new connection, or a close if the connection limit is reached.
    pub fn open_connection(&mut self) -> (ConnectionId, Actions<E>) {
        let now = self.env.now();

        if self.registry.connected_count() >= self.config.max_connections {
            let connection_id = self.registry.allocate_id();
            let reason = DriverError::ConnectionLimit { max: self.config.max_connections };
            return (connection_id, vec![
                ServerAction::Log {
                    level: LogLevel::Warn,
                    message: format!("rejecting connection {connection_id}: {reason}"),
                    timestamp: now,
                },
                ServerAction::CloseConnection { connection_id, reason: reason.to_string() },
            ]);
        }

        let connection_id = self.registry.register(now);
        let name = self.registry.display_name(connection_id).unwrap_or_default().to_string();

        (connection_id, vec![
            ServerAction::SendToConnection {
                connection_id,
                message: ServerMessage::Welcome { connection_id, name },
            },
            ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("connection {connection_id} accepted"),
                timestamp: now,
            },
        ])
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver. Request failures
    /// become `error` replies inside the returned actions; an `Err` means the
    /// event itself could not be attributed, and nothing changed.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Actions<E>, DriverError> {
        match event {
            ServerEvent::FrameReceived { connection_id, text } => {
                self.handle_frame_received(connection_id, &text)
            },
            ServerEvent::ConnectionClosed { connection_id, reason } => {
                Ok(self.handle_connection_closed(connection_id, &reason))
            },
            ServerEvent::Tick => Ok(self.handle_tick()),
        }
    }

    fn handle_frame_received(
        &mut self,
        connection_id: ConnectionId,
        text: &str,
    ) -> Result<Actions<E>, DriverError> {
        if !self.registry.is_connected(connection_id) {
            return Err(DriverError::UnknownConnection(connection_id));
        }

        match bingo_proto::decode(text) {
            Ok(message) => Ok(self.dispatch(connection_id, message)),
            Err(e) => Ok(vec![
                self.log(LogLevel::Warn, format!("dropping frame from {connection_id}: {e}")),
            ]),
        }
    }

    /// Route a decoded message to its handler.
    ///
    /// Handler failures are answered with an `error` reply to the sender and
    /// leave all state untouched.
    pub fn dispatch(&mut self, connection_id: ConnectionId, message: ClientMessage) -> Actions<E> {
        let kind = message.kind().to_string();

        let result = match message {
            ClientMessage::CreateRoom { game_type, room_name, capacity } => {
                self.handle_create_room(connection_id, &game_type, room_name, capacity)
            },
            ClientMessage::JoinRoom { room_id } => self.handle_join_room(connection_id, &room_id),
            ClientMessage::LeaveRoom { room_id } => self.handle_leave_room(connection_id, &room_id),
            ClientMessage::StartGame {} => self.handle_start_game(connection_id),
            ClientMessage::StopGame {} => self.handle_stop_game(connection_id),
            ClientMessage::NumberCall { number } => self.handle_number_call(connection_id, number),
            ClientMessage::Register { name, phone, stake, board, payment } => {
                let profile = Profile { phone, stake, board, payment };
                self.handle_register(connection_id, &name, profile)
            },
            ClientMessage::Offer { target_id, payload } => {
                self.handle_signal(connection_id, SignalKind::Offer, &target_id, payload)
            },
            ClientMessage::Answer { target_id, payload } => {
                self.handle_signal(connection_id, SignalKind::Answer, &target_id, payload)
            },
            ClientMessage::Candidate { target_id, payload } => {
                self.handle_signal(connection_id, SignalKind::Candidate, &target_id, payload)
            },
            ClientMessage::Chat { text, room_id } => {
                self.handle_chat(connection_id, &text, room_id.as_deref())
            },
            ClientMessage::ListRooms {} => Ok(self.handle_list_rooms(connection_id)),
            ClientMessage::Unknown { kind } => Ok(vec![self.log(
                LogLevel::Debug,
                format!("ignoring unknown message type {kind:?} from {connection_id}"),
            )]),
        };

        match result {
            Ok(actions) => actions,
            Err(e) => self.error_response(connection_id, &kind, &e),
        }
    }

    fn handle_create_room(
        &mut self,
        connection_id: ConnectionId,
        game_type: &str,
        room_name: Option<String>,
        capacity: Option<usize>,
    ) -> Result<Actions<E>, DriverError> {
        let capacity = capacity
            .unwrap_or_else(|| self.config.default_capacity.min(self.config.max_capacity));
        let room_name = room_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let room_id = self.room_manager.create_room(
            &mut self.registry,
            connection_id,
            game_type,
            room_name,
            capacity,
            &self.env,
        )?;
        let room = self.room_manager.room(room_id).ok_or(RoomError::RoomNotFound(room_id))?;

        let message = ServerMessage::RoomCreated {
            room_id,
            room_name: room.name().map(str::to_string),
            game_type: room.game_type(),
            capacity: room.capacity(),
            host_id: room.host_id(),
        };

        Ok(vec![
            ServerAction::SendToConnection { connection_id, message },
            self.log(
                LogLevel::Info,
                format!("room {room_id} ({}) created by {connection_id}", room.game_type()),
            ),
        ])
    }

    fn handle_join_room(
        &mut self,
        connection_id: ConnectionId,
        raw_room_id: &str,
    ) -> Result<Actions<E>, DriverError> {
        let room_id = parse_room_id(raw_room_id)?;
        let (snapshot, events) =
            self.room_manager.join_room(&mut self.registry, connection_id, room_id)?;

        let members =
            snapshot.members.iter().map(|&id| self.player_info(id, snapshot.host_id)).collect();
        let message = ServerMessage::RoomJoined {
            room_id,
            room_name: snapshot.name,
            game_type: snapshot.game_type,
            host_id: snapshot.host_id,
            members,
            called_numbers: snapshot.called_numbers,
            game_active: snapshot.game_active,
            capacity: snapshot.capacity,
        };

        let mut actions = vec![ServerAction::SendToConnection { connection_id, message }];
        if !events.is_empty() {
            actions.push(self.log(LogLevel::Info, format!("{connection_id} joined room {room_id}")));
        }
        actions.extend(self.room_event_actions(events));
        Ok(actions)
    }

    fn handle_leave_room(
        &mut self,
        connection_id: ConnectionId,
        raw_room_id: &str,
    ) -> Result<Actions<E>, DriverError> {
        let room_id = parse_room_id(raw_room_id)?;
        let events = self.room_manager.leave_room(&mut self.registry, connection_id, room_id);

        let mut actions = vec![ServerAction::SendToConnection {
            connection_id,
            message: ServerMessage::RoomLeft { room_id },
        }];
        if !events.is_empty() {
            actions.push(self.log(LogLevel::Info, format!("{connection_id} left room {room_id}")));
        }
        actions.extend(self.room_event_actions(events));
        Ok(actions)
    }

    fn handle_start_game(&mut self, connection_id: ConnectionId) -> Result<Actions<E>, DriverError> {
        let room_id = self.current_room(connection_id)?;
        let event = self.room_manager.start_game(connection_id, room_id)?;

        let mut actions = self.room_event_actions(vec![event]);
        actions.push(self.log(LogLevel::Info, format!("game started in room {room_id}")));
        Ok(actions)
    }

    fn handle_stop_game(&mut self, connection_id: ConnectionId) -> Result<Actions<E>, DriverError> {
        let room_id = self.current_room(connection_id)?;
        let event = self.room_manager.stop_game(connection_id, room_id)?;

        let mut actions = self.room_event_actions(vec![event]);
        actions.push(self.log(LogLevel::Info, format!("game stopped in room {room_id}")));
        Ok(actions)
    }

    fn handle_number_call(
        &mut self,
        connection_id: ConnectionId,
        number: i64,
    ) -> Result<Actions<E>, DriverError> {
        let room_id = self.current_room(connection_id)?;
        let event = self.room_manager.record_call(connection_id, room_id, number)?;

        let mut actions = self.room_event_actions(vec![event]);
        actions.push(self.log(LogLevel::Debug, format!("room {room_id}: called {number}")));
        Ok(actions)
    }

    fn handle_register(
        &mut self,
        connection_id: ConnectionId,
        name: &str,
        profile: Profile,
    ) -> Result<Actions<E>, DriverError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DriverError::InvalidRequest("name must not be empty".to_string()));
        }

        let conn = self
            .registry
            .lookup_mut(connection_id)
            .ok_or(DriverError::UnknownConnection(connection_id))?;
        conn.display_name = name.to_string();
        conn.profile = profile;
        let room_id = conn.room_id;

        let mut actions = vec![ServerAction::SendToConnection {
            connection_id,
            message: ServerMessage::Registered { connection_id, name: name.to_string() },
        }];

        if let Some(room) = room_id.and_then(|id| self.room_manager.room(id)) {
            let player = self.player_info(connection_id, room.host_id());
            actions.push(ServerAction::BroadcastToRoom {
                room_id: room.id(),
                message: ServerMessage::PlayerUpdated { room_id: room.id(), player },
                exclude: Some(connection_id),
            });
        }

        Ok(actions)
    }

    fn handle_signal(
        &mut self,
        connection_id: ConnectionId,
        kind: SignalKind,
        target: &str,
        payload: Value,
    ) -> Result<Actions<E>, DriverError> {
        let (target_id, message) =
            relay::relay(&self.registry, connection_id, target, kind, payload)?;

        Ok(vec![
            ServerAction::SendToConnection { connection_id: target_id, message },
            self.log(
                LogLevel::Debug,
                format!("relayed {} from {connection_id} to {target_id}", kind.as_str()),
            ),
        ])
    }

    fn handle_chat(
        &mut self,
        connection_id: ConnectionId,
        text: &str,
        claimed_room: Option<&str>,
    ) -> Result<Actions<E>, DriverError> {
        let room_id = self.current_room(connection_id)?;

        if let Some(claimed) = claimed_room {
            if claimed.parse::<RoomId>().ok() != Some(room_id) {
                return Err(DriverError::InvalidRequest(format!("not a member of room {claimed}")));
            }
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(DriverError::InvalidRequest("chat text must not be empty".to_string()));
        }

        let name = self.registry.display_name(connection_id).unwrap_or_default().to_string();
        Ok(vec![ServerAction::BroadcastToRoom {
            room_id,
            message: ServerMessage::Chat {
                room_id,
                from_id: connection_id,
                name,
                text: text.to_string(),
            },
            exclude: None,
        }])
    }

    fn handle_list_rooms(&self, connection_id: ConnectionId) -> Actions<E> {
        vec![ServerAction::SendToConnection {
            connection_id,
            message: ServerMessage::RoomList { rooms: self.room_manager.summaries() },
        }]
    }

    /// A closed socket is an implicit leave. Safe to run twice.
    fn handle_connection_closed(&mut self, connection_id: ConnectionId, reason: &str) -> Actions<E> {
        let now = self.env.now();

        if !self.registry.mark_disconnected(connection_id, now) {
            return vec![
                self.log(LogLevel::Debug, format!("connection {connection_id} already closed")),
            ];
        }

        let mut actions = Vec::new();
        if let Some(room_id) = self.registry.room_of(connection_id) {
            let events = self.room_manager.leave_room(&mut self.registry, connection_id, room_id);
            actions.extend(self.room_event_actions(events));
        }

        actions.push(self.log(LogLevel::Info, format!("connection {connection_id} closed: {reason}")));
        actions
    }

    fn handle_tick(&mut self) -> Actions<E> {
        let now = self.env.now();
        let mut actions = Vec::new();

        let reaped = self.registry.reap_expired(now, self.config.reap_grace);
        if !reaped.is_empty() {
            actions.push(
                self.log(LogLevel::Debug, format!("reaped {} closed connections", reaped.len())),
            );
        }

        for room_id in self.room_manager.sweep_idle_rooms(now, self.config.room_max_age) {
            actions.push(self.log(LogLevel::Info, format!("swept idle room {room_id}")));
        }

        actions
    }

    /// Turn room events into broadcasts for the affected room.
    fn room_event_actions(&self, events: Vec<RoomEvent>) -> Actions<E> {
        events
            .into_iter()
            .map(|event| match event {
                RoomEvent::PlayerJoined { room_id, player } => {
                    let host_id = self.room_manager.room(room_id).map_or(player, |r| r.host_id());
                    ServerAction::BroadcastToRoom {
                        room_id,
                        message: ServerMessage::PlayerJoined {
                            room_id,
                            player: self.player_info(player, host_id),
                        },
                        exclude: Some(player),
                    }
                },
                RoomEvent::PlayerLeft { room_id, player } => ServerAction::BroadcastToRoom {
                    room_id,
                    message: ServerMessage::PlayerLeft { room_id, player_id: player },
                    exclude: None,
                },
                RoomEvent::HostChanged { room_id, host_id } => ServerAction::BroadcastToRoom {
                    room_id,
                    message: ServerMessage::NewHost { room_id, host_id },
                    exclude: None,
                },
                RoomEvent::RoomClosed { room_id } => {
                    self.log(LogLevel::Info, format!("room {room_id} closed"))
                },
                RoomEvent::NumberCalled { room_id, number, called_numbers } => {
                    ServerAction::BroadcastToRoom {
                        room_id,
                        message: ServerMessage::NumberCalled { room_id, number, called_numbers },
                        exclude: None,
                    }
                },
                RoomEvent::GameStarted { room_id } => ServerAction::BroadcastToRoom {
                    room_id,
                    message: ServerMessage::GameStarted { room_id },
                    exclude: None,
                },
                RoomEvent::GameStopped { room_id, called_numbers } => {
                    ServerAction::BroadcastToRoom {
                        room_id,
                        message: ServerMessage::GameStopped { room_id, called_numbers },
                        exclude: None,
                    }
                },
            })
            .collect()
    }

    fn error_response(
        &self,
        connection_id: ConnectionId,
        kind: &str,
        error: &DriverError,
    ) -> Actions<E> {
        vec![
            ServerAction::SendToConnection {
                connection_id,
                message: ServerMessage::Error(error.to_payload()),
            },
            self.log(LogLevel::Debug, format!("{kind} from {connection_id} rejected: {error}")),
        ]
    }

    fn current_room(&self, connection_id: ConnectionId) -> Result<RoomId, DriverError> {
        self.registry.room_of(connection_id).ok_or(RoomError::NotInRoom(connection_id).into())
    }

    fn player_info(&self, id: ConnectionId, host_id: ConnectionId) -> PlayerInfo {
        PlayerInfo {
            id,
            name: self.registry.display_name(id).unwrap_or_default().to_string(),
            is_host: id == host_id,
        }
    }

    fn log(&self, level: LogLevel, message: String) -> ServerAction<E::Instant> {
        ServerAction::Log { level, message, timestamp: self.env.now() }
    }

    /// Connected members of a room.
    pub fn connections_in_room(&self, room_id: RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.room_manager.members(room_id).filter(|&id| self.registry.is_connected(id))
    }

    /// Who a [`ServerAction::BroadcastToRoom`] reaches right now.
    pub fn broadcast_targets(
        &self,
        room_id: RoomId,
        exclude: Option<ConnectionId>,
    ) -> Vec<ConnectionId> {
        self.connections_in_room(room_id).filter(|&id| Some(id) != exclude).collect()
    }

    /// Connection records.
    pub fn registry(&self) -> &ConnectionRegistry<E::Instant> {
        &self.registry
    }

    /// Rooms.
    pub fn room_manager(&self) -> &RoomManager<E::Instant> {
        &self.room_manager
    }

    /// Get the number of open connections
    pub fn connection_count(&self) -> usize {
        self.registry.connected_count()
    }

    /// Check if a room exists
    pub fn has_room(&self, room_id: RoomId) -> bool {
        self.room_manager.has_room(room_id)
    }

    /// Current counters.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            connections: self.registry.connected_count(),
            rooms: self.room_manager.room_count(),
            players: self.room_manager.rooms().map(|r| r.members().len()).sum(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Environment the driver reads time and randomness from.
    pub fn env(&self) -> &E {
        &self.env
    }
}

fn parse_room_id(raw: &str) -> Result<RoomId, DriverError> {
    raw.parse().map_err(|_| DriverError::UnknownRoom(raw.to_string()))
}

impl<E: Environment> std::fmt::Debug for ServerDriver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("connection_count", &self.registry.connected_count())
            .field("room_manager", &self.room_manager)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
