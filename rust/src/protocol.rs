//! JSON frames exchanged with the messaging endpoint.
//!
//! Every frame is a text message tagged by `"type"`. Inbound field names also accept the
//! document-store spelling (`_id`, `conversation`) the REST API uses for the same records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Message, MessageDeliveryState, UserRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Join { room_id: String },
    #[serde(rename_all = "camelCase")]
    Leave { room_id: String },
    #[serde(rename_all = "camelCase")]
    Message {
        conversation_id: String,
        author_id: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
}

impl ClientFrame {
    pub fn tag(&self) -> &'static str {
        match self {
            ClientFrame::Join { .. } => "join",
            ClientFrame::Leave { .. } => "leave",
            ClientFrame::Message { .. } => "message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Connected { session_id: String },
    Message(InboundMessage),
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "conversation")]
    pub conversation_id: String,
    pub author: WireUser,
    pub text: String,
    /// Receive time when the endpoint omits it.
    #[serde(default = "crate::state::now")]
    pub created_at: DateTime<Utc>,
    /// Echo of the provisional id the sender attached, when the endpoint relays it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl InboundMessage {
    pub fn to_message(&self) -> Message {
        Message {
            id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            author: self.author.to_user_ref(),
            text: self.text.clone(),
            created_at: self.created_at,
            delivery: MessageDeliveryState::Sent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireUser {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl WireUser {
    pub fn to_user_ref(&self) -> UserRef {
        UserRef {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| "User".to_string()),
        }
    }
}

pub fn encode_client_frame(frame: &ClientFrame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

pub fn decode_server_frame(text: &str) -> serde_json::Result<ServerFrame> {
    serde_json::from_str(text)
}
