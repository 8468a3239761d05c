//! Runtime error types.

use crate::server_error::DriverError;

/// Errors that can occur in the server runtime.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error (invalid bind address, bad limits).
    ///
    /// Fatal. Fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, accept failure).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Driver error (from `ServerDriver` processing).
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

#[cfg(test)]
mod tests {
    use bingo_core::ConnectionId;

    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("capacity must be positive".to_string());
        assert_eq!(err.to_string(), "configuration error: capacity must be positive");

        let err = ServerError::from(DriverError::UnknownConnection(ConnectionId::new(1)));
        assert_eq!(err.to_string(), "driver error: connection not found: 0000000000000001");
    }
}
