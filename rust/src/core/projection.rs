use super::*;

use crate::state::{ChatMessage, Conversation, ConversationSummary, ConversationViewState};

fn summary(
    conversation: &Conversation,
    me: Option<&str>,
    active: Option<&str>,
    unread_count: u32,
) -> ConversationSummary {
    let last = conversation.messages.last();
    ConversationSummary {
        conversation_id: conversation.id.clone(),
        kind: conversation.kind,
        title: conversation.title_for(me),
        participants: conversation.participants.clone(),
        message_count: conversation.messages.len().min(u32::MAX as usize) as u32,
        last_message: last.map(|m| m.text.clone()),
        last_message_at: last.map(|m| m.created_at.timestamp()),
        unread_count,
        is_active: active == Some(conversation.id.as_str()),
    }
}

fn view(conversation: &Conversation, me: Option<&str>) -> ConversationViewState {
    ConversationViewState {
        conversation_id: conversation.id.clone(),
        kind: conversation.kind,
        title: conversation.title_for(me),
        participants: conversation.participants.clone(),
        messages: conversation
            .messages
            .iter()
            .map(|m| ChatMessage::from_message(m, me))
            .collect(),
    }
}

impl AppCore {
    /// Rebuild the read-only views from the store, unread map and transport status.
    pub(super) fn refresh_projection(&mut self) {
        let me = self.session.as_ref().map(|s| s.me.id.as_str());
        let active = self.active_conversation_id.as_deref();

        self.state.conversation_list = self
            .store
            .iter()
            .map(|c| summary(c, me, active, self.unread.get(&c.id)))
            .collect();
        self.state.current_conversation = active
            .and_then(|id| self.store.get(id))
            .map(|c| view(c, me));
        self.state.connection = self.transport.status().clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConversationKind, Message, MessageDeliveryState};
    use chrono::{TimeZone, Utc};

    fn conversation() -> Conversation {
        Conversation {
            id: "c1".into(),
            kind: ConversationKind::Direct,
            name: None,
            participants: vec![UserRef::new("u1", "Ann"), UserRef::new("u2", "Bob")],
            messages: vec![Message {
                id: "m1".into(),
                conversation_id: "c1".into(),
                author: UserRef::new("u1", "Ann"),
                text: "hi".into(),
                created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
                delivery: MessageDeliveryState::Sent,
            }],
        }
    }

    #[test]
    fn summary_reflects_last_message_and_unread() {
        let s = summary(&conversation(), Some("u1"), Some("c2"), 3);
        assert_eq!(s.title, "Bob");
        assert_eq!(s.message_count, 1);
        assert_eq!(s.last_message.as_deref(), Some("hi"));
        assert_eq!(s.unread_count, 3);
        assert!(!s.is_active);
    }

    #[test]
    fn view_marks_own_messages() {
        let v = view(&conversation(), Some("u1"));
        assert_eq!(v.messages.len(), 1);
        assert!(v.messages[0].is_mine);
        let v = view(&conversation(), Some("u2"));
        assert!(!v.messages[0].is_mine);
    }
}
