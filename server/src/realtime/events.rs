use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::model::{Interest, Message, UserId};

/// Frames a client may send. The sender is always the socket's owner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    SendMessage {
        receiver_id: UserId,
        body: String,
    },
    VideoInvite {
        receiver_id: UserId,
        #[serde(default)]
        payload: Value,
    },
    WebrtcOffer {
        receiver_id: UserId,
        payload: Value,
    },
    WebrtcAnswer {
        receiver_id: UserId,
        payload: Value,
    },
    IceCandidate {
        receiver_id: UserId,
        payload: Value,
    },
}

impl ClientEvent {
    pub fn receiver_id(&self) -> UserId {
        match self {
            ClientEvent::SendMessage { receiver_id, .. }
            | ClientEvent::VideoInvite { receiver_id, .. }
            | ClientEvent::WebrtcOffer { receiver_id, .. }
            | ClientEvent::WebrtcAnswer { receiver_id, .. }
            | ClientEvent::IceCandidate { receiver_id, .. } => *receiver_id,
        }
    }
}

/// Frames pushed to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    NewMessage { message: Message },
    InterestReceived { interest: Interest },
    InterestAnswered { interest: Interest },
    VideoInvite { sender_id: UserId, payload: Value },
    WebrtcOffer { sender_id: UserId, payload: Value },
    WebrtcAnswer { sender_id: UserId, payload: Value },
    IceCandidate { sender_id: UserId, payload: Value },
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_frames_use_snake_case_tags() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "webrtc_offer",
            "receiverId": 8,
            "payload": { "sdp": "v=0" },
        }))
        .unwrap();
        assert_eq!(event.receiver_id(), 8);
        assert!(matches!(event, ClientEvent::WebrtcOffer { .. }));
    }

    #[test]
    fn client_frames_cannot_name_a_sender() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "video_invite",
            "receiverId": 3,
            "senderId": 99,
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::VideoInvite {
                receiver_id: 3,
                payload: Value::Null
            }
        );
    }

    #[test]
    fn server_frames_carry_the_sender() {
        let frame = serde_json::to_value(ServerEvent::IceCandidate {
            sender_id: 4,
            payload: json!({ "candidate": "c" }),
        })
        .unwrap();
        assert_eq!(
            frame,
            json!({ "type": "ice_candidate", "senderId": 4, "payload": { "candidate": "c" } })
        );
    }
}
