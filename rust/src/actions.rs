#[derive(Debug, Clone)]
pub enum AppAction {
    // Auth
    Login {
        credential: String,
        user_id: String,
        user_name: String,
    },
    Logout,

    // Session
    Reconnect,

    // Conversations
    OpenConversation {
        conversation_id: String,
    },
    CloseConversation,
    RefreshConversations,
    CreateChannel {
        name: String,
        participant_ids: Vec<String>,
    },
    CreateDirect {
        participant_id: String,
    },
    DeleteChannel {
        conversation_id: String,
    },

    // Messages
    SendMessage {
        conversation_id: String,
        text: String,
    },
    RetryMessage {
        conversation_id: String,
        message_id: String,
    },

    // UI
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes the credential).
    pub fn tag(&self) -> &'static str {
        match self {
            // Auth
            AppAction::Login { .. } => "Login",
            AppAction::Logout => "Logout",

            // Session
            AppAction::Reconnect => "Reconnect",

            // Conversations
            AppAction::OpenConversation { .. } => "OpenConversation",
            AppAction::CloseConversation => "CloseConversation",
            AppAction::RefreshConversations => "RefreshConversations",
            AppAction::CreateChannel { .. } => "CreateChannel",
            AppAction::CreateDirect { .. } => "CreateDirect",
            AppAction::DeleteChannel { .. } => "DeleteChannel",

            // Messages
            AppAction::SendMessage { .. } => "SendMessage",
            AppAction::RetryMessage { .. } => "RetryMessage",

            // UI
            AppAction::ClearToast => "ClearToast",
        }
    }
}
