//! Signaling relay.
//!
//! Forwards WebRTC negotiation payloads between two connections. Stateless:
//! the only thing it consults is the registry, to resolve the target. The
//! payload is never inspected.

use bingo_core::ConnectionId;
use bingo_proto::{ErrorCode, ServerMessage, SignalKind};
use serde_json::Value;

use crate::registry::ConnectionRegistry;

/// Errors from relaying a signaling message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Target id does not name a connected connection.
    #[error("target {0:?} is not connected")]
    TargetNotFound(String),
}

impl RelayError {
    /// Wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TargetNotFound(_) => ErrorCode::NotFound,
        }
    }
}

/// Resolve `target` and build the message to deliver to it.
///
/// Relaying to oneself is allowed. An unparseable id, an unknown id and an id
/// whose socket has closed all resolve to [`RelayError::TargetNotFound`].
pub fn relay<I>(
    registry: &ConnectionRegistry<I>,
    from: ConnectionId,
    target: &str,
    kind: SignalKind,
    payload: Value,
) -> Result<(ConnectionId, ServerMessage), RelayError> {
    let target_id = target
        .parse::<ConnectionId>()
        .ok()
        .filter(|&id| registry.is_connected(id))
        .ok_or_else(|| RelayError::TargetNotFound(target.to_string()))?;

    Ok((target_id, ServerMessage::signal(kind, from, payload)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn registry_with(n: usize) -> (ConnectionRegistry<Duration>, Vec<ConnectionId>) {
        let mut registry = ConnectionRegistry::new();
        let ids = (0..n).map(|_| registry.register(Duration::ZERO)).collect();
        (registry, ids)
    }

    #[test]
    fn relay_tags_payload_with_sender() {
        let (registry, ids) = registry_with(2);
        let payload = json!({"sdp": "v=0", "nested": [1, 2, 3]});

        let (target, message) =
            relay(&registry, ids[0], &ids[1].to_string(), SignalKind::Offer, payload.clone())
                .unwrap();

        assert_eq!(target, ids[1]);
        assert_eq!(message, ServerMessage::Offer { from_id: ids[0], payload });
    }

    #[test]
    fn relay_to_self_is_allowed() {
        let (registry, ids) = registry_with(1);
        let (target, message) =
            relay(&registry, ids[0], &ids[0].to_string(), SignalKind::Candidate, json!(null))
                .unwrap();

        assert_eq!(target, ids[0]);
        assert!(matches!(message, ServerMessage::Candidate { .. }));
    }

    #[test]
    fn relay_to_unknown_target_fails() {
        let (registry, ids) = registry_with(1);

        for target in ["ffff", "not-an-id", ""] {
            let err = relay(&registry, ids[0], target, SignalKind::Answer, json!({})).unwrap_err();
            assert_eq!(err, RelayError::TargetNotFound(target.to_string()));
            assert_eq!(err.code(), ErrorCode::NotFound);
        }
    }

    #[test]
    fn relay_to_disconnected_target_fails() {
        let (mut registry, ids) = registry_with(2);
        registry.mark_disconnected(ids[1], Duration::from_secs(1));

        let result = relay(&registry, ids[0], &ids[1].to_string(), SignalKind::Offer, json!({}));
        assert!(matches!(result, Err(RelayError::TargetNotFound(_))));
    }
}
