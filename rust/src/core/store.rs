// Conversation store: the single in-memory view of conversations and their messages.

use chrono::Duration;

use crate::state::{Conversation, Message, MessageDeliveryState};

/// Outcome of feeding one message into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ingest {
    /// Appended; the user has not seen it yet.
    Inserted,
    /// Matched one of our own pending sends, which adopted the server id.
    Confirmed { provisional_id: String },
    /// Same id already present. No change.
    Duplicate,
    UnknownConversation,
}

impl Ingest {
    pub(crate) fn is_new(&self) -> bool {
        matches!(self, Ingest::Inserted)
    }
}

pub(crate) struct ConversationStore {
    conversations: Vec<Conversation>,
    reconcile_window: Duration,
}

impl ConversationStore {
    pub(crate) fn new(reconcile_window: Duration) -> Self {
        Self {
            conversations: vec![],
            reconcile_window,
        }
    }

    pub(crate) fn load_all(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Replace the store with a fresh backend snapshot, keeping what the snapshot cannot
    /// know about: unconfirmed local sends and messages ingested after it was taken.
    /// Returns the ids of conversations that are gone.
    pub(crate) fn reload(&mut self, snapshot: Vec<Conversation>) -> Vec<String> {
        let mut previous = std::mem::replace(&mut self.conversations, snapshot);
        for conv in &mut self.conversations {
            let Some(idx) = previous.iter().position(|p| p.id == conv.id) else {
                continue;
            };
            let old = previous.swap_remove(idx);
            for msg in old.messages {
                if !conv.messages.iter().any(|m| m.id == msg.id) {
                    conv.messages.push(msg);
                }
            }
        }
        previous.into_iter().map(|c| c.id).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.conversations.clear();
    }

    pub(crate) fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    fn get_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == conversation_id)
    }

    pub(crate) fn contains(&self, conversation_id: &str) -> bool {
        self.get(conversation_id).is_some()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    pub(crate) fn first_id(&self) -> Option<String> {
        self.conversations.first().map(|c| c.id.clone())
    }

    /// Returns false when a conversation with the same id is already present.
    pub(crate) fn add_conversation(&mut self, conversation: Conversation) -> bool {
        if self.contains(&conversation.id) {
            return false;
        }
        self.conversations.push(conversation);
        true
    }

    pub(crate) fn remove_conversation(&mut self, conversation_id: &str) -> Option<Conversation> {
        let idx = self
            .conversations
            .iter()
            .position(|c| c.id == conversation_id)?;
        Some(self.conversations.remove(idx))
    }

    /// Ingest an authoritative message. Both the broadcast-back of our own sends and
    /// messages from others come through here.
    ///
    /// `client_id` is the provisional id echoed back by the endpoint, if any; when present
    /// only that entry can match. Without it, the oldest unconfirmed local send with the same
    /// author and text whose local time is within the reconcile window is taken as the match.
    pub(crate) fn upsert_message(
        &mut self,
        conversation_id: &str,
        message: Message,
        client_id: Option<&str>,
    ) -> Ingest {
        let window = self.reconcile_window;
        let Some(conv) = self.get_mut(conversation_id) else {
            return Ingest::UnknownConversation;
        };
        if conv.messages.iter().any(|m| m.id == message.id) {
            return Ingest::Duplicate;
        }

        let unconfirmed = |m: &Message| m.delivery != MessageDeliveryState::Sent;
        let matched = match client_id {
            Some(cid) => conv
                .messages
                .iter()
                .position(|m| unconfirmed(m) && m.id == cid),
            None => conv.messages.iter().position(|m| {
                unconfirmed(m)
                    && m.author.id == message.author.id
                    && m.text == message.text
                    && (m.created_at - message.created_at).abs() <= window
            }),
        };

        if let Some(idx) = matched {
            let entry = &mut conv.messages[idx];
            let provisional_id = std::mem::replace(&mut entry.id, message.id);
            entry.created_at = message.created_at;
            entry.delivery = MessageDeliveryState::Sent;
            return Ingest::Confirmed { provisional_id };
        }

        let mut message = message;
        message.conversation_id = conversation_id.to_string();
        message.delivery = MessageDeliveryState::Sent;
        conv.messages.push(message);
        Ingest::Inserted
    }

    /// Speculatively insert a local send. Returns false if the conversation is unknown or
    /// the provisional id is already present.
    pub(crate) fn insert_pending(&mut self, message: Message) -> bool {
        let Some(conv) = self.get_mut(&message.conversation_id) else {
            return false;
        };
        if conv.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let mut message = message;
        message.delivery = MessageDeliveryState::Pending;
        conv.messages.push(message);
        true
    }

    pub(crate) fn find_message(&self, conversation_id: &str, message_id: &str) -> Option<&Message> {
        self.get(conversation_id)?
            .messages
            .iter()
            .find(|m| m.id == message_id)
    }

    pub(crate) fn set_delivery(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        delivery: MessageDeliveryState,
    ) -> bool {
        let Some(msg) = self
            .get_mut(conversation_id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
        else {
            return false;
        };
        msg.delivery = delivery;
        true
    }

    /// Mark every still-pending local send as failed. Returns how many changed.
    pub(crate) fn fail_pending(&mut self, reason: &str) -> usize {
        let mut n = 0;
        for msg in self
            .conversations
            .iter_mut()
            .flat_map(|c| c.messages.iter_mut())
            .filter(|m| m.delivery == MessageDeliveryState::Pending)
        {
            msg.delivery = MessageDeliveryState::Failed {
                reason: reason.to_string(),
            };
            n += 1;
        }
        n
    }
}
