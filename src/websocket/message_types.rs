use crate::models::message::{AttachmentKind, Message};
use serde::{Deserialize, Serialize};

/// Inbound WebSocket events from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "join_room")]
    JoinRoom { room_id: String },

    #[serde(rename = "leave_room")]
    LeaveRoom { room_id: String },

    /// Submit a message: persisted first, then fanned out to the room.
    #[serde(rename = "send_message")]
    SendMessage {
        room_id: String,
        sender_id: String,
        receiver_id: String,
        /// Plaintext body; may be empty for attachment-only messages.
        #[serde(default)]
        message: String,
        #[serde(default)]
        attachment_url: Option<String>,
        #[serde(default)]
        attachment_kind: Option<AttachmentKind>,
    },
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    /// A persisted message, decrypted, delivered to every member of the
    /// room including the sender's own connection.
    #[serde(rename = "receive_message")]
    ReceiveMessage { message: Message },

    #[serde(rename = "error")]
    Error { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_parses_with_pdf_alias() {
        let raw = r#"{
            "type": "send_message",
            "room_id": "admin-u1",
            "sender_id": "u1",
            "receiver_id": "admin",
            "message": "see attached",
            "attachment_url": "https://cdn.example/f.pdf",
            "attachment_kind": "pdf"
        }"#;
        let evt: WsInboundEvent = serde_json::from_str(raw).unwrap();
        match evt {
            WsInboundEvent::SendMessage {
                attachment_kind, ..
            } => assert_eq!(attachment_kind, Some(AttachmentKind::Document)),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn text_only_send_message_needs_no_attachment_fields() {
        let raw = r#"{
            "type": "send_message",
            "room_id": "admin-u1",
            "sender_id": "admin",
            "receiver_id": "u1",
            "message": "hello"
        }"#;
        let evt: WsInboundEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(evt, WsInboundEvent::SendMessage { .. }));
    }

    #[test]
    fn join_room_round_trips() {
        let evt = WsInboundEvent::JoinRoom {
            room_id: "admin-u1".into(),
        };
        let json = serde_json::to_string(&evt).unwrap();
        assert!(json.contains("\"type\":\"join_room\""));
        let back: WsInboundEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, WsInboundEvent::JoinRoom { room_id } if room_id == "admin-u1"));
    }
}
