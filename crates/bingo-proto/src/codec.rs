//! Frame decoding and encoding.

use serde::Deserialize;

use crate::{
    client::ClientMessage,
    errors::{ProtocolError, Result},
    server::ServerMessage,
};

/// Largest inbound text frame accepted, in bytes.
///
/// Signaling payloads (SDP) are the biggest legitimate frames and stay well
/// under this.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Just the discriminant, to tell "unknown kind" apart from "bad fields".
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode one inbound text frame.
///
/// A `type` outside [`ClientMessage::KINDS`] decodes to
/// [`ClientMessage::Unknown`]; everything else that fails is a
/// [`ProtocolError`].
pub fn decode(raw: &str) -> Result<ClientMessage> {
    if raw.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge { size: raw.len(), max: MAX_FRAME_LEN });
    }

    match serde_json::from_str::<ClientMessage>(raw) {
        Ok(message) => Ok(message),
        Err(typed_err) => {
            let envelope: Envelope = serde_json::from_str(raw)
                .map_err(|e| ProtocolError::MissingType(e.to_string()))?;

            if ClientMessage::KINDS.contains(&envelope.kind.as_str()) {
                Err(ProtocolError::Malformed { kind: envelope.kind, reason: typed_err.to_string() })
            } else {
                Ok(ClientMessage::Unknown { kind: envelope.kind })
            }
        },
    }
}

/// Encode one outbound message as a text frame.
pub fn encode(message: &ServerMessage) -> Result<String> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use bingo_core::{ConnectionId, RoomId};
    use serde_json::json;

    use super::*;
    use crate::{ErrorCode, ErrorPayload};

    #[test]
    fn decodes_create_room_with_optional_fields() {
        let msg = decode(r#"{"type":"createRoom","gameType":"75ball","roomName":"Friday","capacity":8}"#)
            .unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom {
            game_type: "75ball".to_string(),
            room_name: Some("Friday".to_string()),
            capacity: Some(8),
        });

        let msg = decode(r#"{"type":"createRoom","gameType":"90ball"}"#).unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom {
            game_type: "90ball".to_string(),
            room_name: None,
            capacity: None,
        });
    }

    #[test]
    fn decodes_field_less_kinds_with_extra_fields() {
        assert_eq!(decode(r#"{"type":"startGame"}"#).unwrap(), ClientMessage::StartGame {});
        assert_eq!(
            decode(r#"{"type":"stopGame","roomId":"ignored"}"#).unwrap(),
            ClientMessage::StopGame {}
        );
    }

    #[test]
    fn decodes_signal_payload_verbatim() {
        let msg = decode(r#"{"type":"candidate","targetId":"2a","payload":{"sdpMid":"0","n":[1,2]}}"#)
            .unwrap();
        let (kind, target, payload) = msg.signal().unwrap();
        assert_eq!(kind, crate::SignalKind::Candidate);
        assert_eq!(target, "2a");
        assert_eq!(payload, &json!({"sdpMid": "0", "n": [1, 2]}));
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        let msg = decode(r#"{"type":"claimBingo","pattern":"x"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown { kind: "claimBingo".to_string() });
        assert_eq!(msg.kind(), "claimBingo");
    }

    #[test]
    fn known_kind_with_bad_fields_is_malformed() {
        let err = decode(r#"{"type":"numberCall","number":"forty-two"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { ref kind, .. } if kind == "numberCall"));

        let err = decode(r#"{"type":"joinRoom"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
    }

    #[test]
    fn missing_type_is_rejected() {
        for raw in ["", "not json", "[]", "42", r#"{"number":5}"#, r#"{"type":7}"#] {
            assert!(
                matches!(decode(raw), Err(ProtocolError::MissingType(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn oversized_frame_is_rejected_before_parsing() {
        let raw = format!(r#"{{"type":"chat","text":"{}"}}"#, "a".repeat(MAX_FRAME_LEN));
        assert!(matches!(decode(&raw), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn every_known_kind_is_listed() {
        let samples = [
            ClientMessage::CreateRoom { game_type: "75ball".into(), room_name: None, capacity: None },
            ClientMessage::JoinRoom { room_id: "1".into() },
            ClientMessage::LeaveRoom { room_id: "1".into() },
            ClientMessage::StartGame {},
            ClientMessage::StopGame {},
            ClientMessage::NumberCall { number: 1 },
            ClientMessage::Register {
                name: "a".into(),
                phone: None,
                stake: None,
                board: None,
                payment: None,
            },
            ClientMessage::Offer { target_id: "1".into(), payload: json!(null) },
            ClientMessage::Answer { target_id: "1".into(), payload: json!(null) },
            ClientMessage::Candidate { target_id: "1".into(), payload: json!(null) },
            ClientMessage::Chat { text: "hi".into(), room_id: None },
            ClientMessage::ListRooms {},
        ];

        assert_eq!(samples.len(), ClientMessage::KINDS.len());
        for sample in samples {
            let raw = serde_json::to_string(&sample).unwrap();
            assert!(ClientMessage::KINDS.contains(&sample.kind()));
            assert_eq!(decode(&raw).unwrap(), sample);
        }
    }

    #[test]
    fn encodes_error_flat() {
        let msg = ServerMessage::Error(ErrorPayload::new(ErrorCode::AlreadyInRoom, "leave first"));
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(value, json!({"type": "error", "code": "ALREADY_IN_ROOM", "message": "leave first"}));
    }

    #[test]
    fn encodes_ids_as_hex_strings() {
        let msg = ServerMessage::NewHost { room_id: RoomId::new(1), host_id: ConnectionId::new(2) };
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(value, json!({
            "type": "newHost",
            "roomId": "0000000000000001",
            "hostId": "0000000000000002",
        }));
    }
}
