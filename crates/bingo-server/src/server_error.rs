//! Driver error types.
//!
//! Business failures (room rules, relay targets) are turned into `error`
//! replies by the driver and never escape `process_event`. What does escape is
//! a [`DriverError`] about the event itself, such as a frame attributed to a
//! connection the driver does not know.

use bingo_core::ConnectionId;
use bingo_proto::{ErrorCode, ErrorPayload, ProtocolError};

use crate::{relay::RelayError, room_manager::RoomError};

/// Errors that can occur during driver operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// Event names a connection that is unknown or already closed.
    ///
    /// Expected for frames racing a socket close. The runtime logs and drops.
    #[error("connection not found: {0}")]
    UnknownConnection(ConnectionId),

    /// Room id in a request is not a valid room id.
    #[error("room not found: {0:?}")]
    UnknownRoom(String),

    /// Accepting another socket would exceed `max_connections`.
    #[error("connection limit reached ({max})")]
    ConnectionLimit {
        /// Configured limit
        max: usize,
    },

    /// Room rule rejected the request.
    #[error("room error: {0}")]
    Room(#[from] RoomError),

    /// Signaling target could not be resolved.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// Inbound frame could not be decoded, or a reply could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Request is well-formed but its values are not acceptable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DriverError {
    /// Wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownConnection(_) | Self::UnknownRoom(_) => ErrorCode::NotFound,
            Self::Room(err) => err.code(),
            Self::Relay(err) => err.code(),
            Self::ConnectionLimit { .. } | Self::Protocol(_) | Self::InvalidRequest(_) => {
                ErrorCode::InvalidRequest
            },
        }
    }

    /// Body of the `error` reply for this failure.
    pub fn to_payload(&self) -> ErrorPayload {
        let message = match self {
            Self::Room(err) => err.to_string(),
            Self::Relay(err) => err.to_string(),
            Self::InvalidRequest(msg) => msg.clone(),
            other => other.to_string(),
        };
        ErrorPayload::new(self.code(), message)
    }
}

#[cfg(test)]
mod tests {
    use bingo_core::RoomId;

    use super::*;

    #[test]
    fn driver_error_display() {
        let err = DriverError::UnknownConnection(ConnectionId::new(42));
        assert_eq!(err.to_string(), "connection not found: 000000000000002a");

        let err = DriverError::ConnectionLimit { max: 3 };
        assert_eq!(err.to_string(), "connection limit reached (3)");
    }

    #[test]
    fn room_errors_keep_their_code_and_message() {
        let err = DriverError::from(RoomError::Duplicate(42));
        let payload = err.to_payload();

        assert_eq!(payload.code, ErrorCode::Duplicate);
        assert_eq!(payload.message, "number 42 has already been called");
    }

    #[test]
    fn not_found_codes() {
        let room = DriverError::from(RoomError::RoomNotFound(RoomId::new(1)));
        let relay = DriverError::from(RelayError::TargetNotFound("x".to_string()));

        assert_eq!(room.code(), ErrorCode::NotFound);
        assert_eq!(relay.code(), ErrorCode::NotFound);
        assert_eq!(DriverError::UnknownRoom("zz".to_string()).code(), ErrorCode::NotFound);
    }

    #[test]
    fn invalid_request_message_is_passed_through() {
        let payload = DriverError::InvalidRequest("name must not be empty".to_string()).to_payload();
        assert_eq!(payload.code, ErrorCode::InvalidRequest);
        assert_eq!(payload.message, "name must not be empty");
    }
}
