use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    /// Named, multi-participant, persistent.
    Channel,
    /// Exactly two participants, no name.
    Direct,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageDeliveryState {
    Pending,
    Sent,
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned id, or the provisional client id while `delivery` is not `Sent`.
    pub id: String,
    pub conversation_id: String,
    pub author: UserRef,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub delivery: MessageDeliveryState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub participants: Vec<UserRef>,
    /// Arrival order, not server timestamp order.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Display title as seen by `me`: `#name` for channels, the other participants for
    /// direct conversations.
    pub fn title_for(&self, me: Option<&str>) -> String {
        match self.kind {
            ConversationKind::Channel => {
                format!("#{}", self.name.as_deref().unwrap_or_default())
            }
            ConversationKind::Direct => {
                let others: Vec<&str> = self
                    .participants
                    .iter()
                    .filter(|p| Some(p.id.as_str()) != me)
                    .map(|p| p.name.as_str())
                    .collect();
                if others.is_empty() {
                    "Private conversation".to_string()
                } else {
                    others.join(", ")
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Errored { reason: String },
}

impl ConnectionStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub auth: AuthState,
    pub connection: ConnectionStatus,
    pub busy: BusyState,
    pub conversation_list: Vec<ConversationSummary>,
    pub current_conversation: Option<ConversationViewState>,
    pub users: Vec<UserRef>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            auth: AuthState::LoggedOut,
            connection: ConnectionStatus::Disconnected,
            busy: BusyState::idle(),
            conversation_list: vec![],
            current_conversation: None,
            users: vec![],
            toast: None,
        }
    }

    pub fn unread_count(&self, conversation_id: &str) -> u32 {
        self.conversation_list
            .iter()
            .find(|c| c.conversation_id == conversation_id)
            .map(|c| c.unread_count)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggedIn { user: UserRef },
}

/// "In flight" flags for CRUD round-trips the UI should reflect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub loading_conversations: bool,
    pub creating_conversation: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            loading_conversations: false,
            creating_conversation: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub kind: ConversationKind,
    pub title: String,
    pub participants: Vec<UserRef>,
    pub message_count: u32,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    pub unread_count: u32,
    pub is_active: bool,
}

#[derive(Clone, Debug)]
pub struct ConversationViewState {
    pub conversation_id: String,
    pub kind: ConversationKind,
    pub title: String,
    pub participants: Vec<UserRef>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: i64,
    pub is_mine: bool,
    pub delivery: MessageDeliveryState,
}

impl ChatMessage {
    pub fn from_message(message: &Message, me: Option<&str>) -> Self {
        Self {
            id: message.id.clone(),
            author_id: message.author.id.clone(),
            author_name: message.author.name.clone(),
            text: message.text.clone(),
            created_at: message.created_at.timestamp(),
            is_mine: Some(message.author.id.as_str()) == me,
            delivery: message.delivery.clone(),
        }
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
