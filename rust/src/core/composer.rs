use chrono::{DateTime, Utc};

use crate::error::ComposeError;
use crate::protocol::ClientFrame;
use crate::state::{Message, MessageDeliveryState, UserRef};

#[derive(Debug, Clone)]
pub(crate) struct ComposedMessage {
    pub(crate) frame: ClientFrame,
    /// Optimistic local copy, keyed by the provisional id carried in `frame`.
    pub(crate) pending: Message,
}

/// Validate local input and build the outbound frame plus its optimistic echo.
pub(crate) fn compose(
    active: Option<&str>,
    conversation_id: &str,
    author: &UserRef,
    text: &str,
    now: DateTime<Utc>,
) -> Result<ComposedMessage, ComposeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ComposeError::EmptyText);
    }
    if active != Some(conversation_id) {
        return Err(ComposeError::NoActiveConversation);
    }
    let provisional_id = uuid::Uuid::new_v4().to_string();
    Ok(ComposedMessage {
        frame: message_frame(conversation_id, &author.id, text, &provisional_id),
        pending: Message {
            id: provisional_id,
            conversation_id: conversation_id.to_string(),
            author: author.clone(),
            text: text.to_string(),
            created_at: now,
            delivery: MessageDeliveryState::Pending,
        },
    })
}

pub(crate) fn message_frame(
    conversation_id: &str,
    author_id: &str,
    text: &str,
    provisional_id: &str,
) -> ClientFrame {
    ClientFrame::Message {
        conversation_id: conversation_id.to_string(),
        author_id: author_id.to_string(),
        text: text.to_string(),
        client_id: Some(provisional_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> UserRef {
        UserRef::new("u1", "Ann")
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = compose(Some("c1"), "c1", &ann(), "  \n\t", Utc::now()).unwrap_err();
        assert_eq!(err, ComposeError::EmptyText);
    }

    #[test]
    fn requires_the_target_to_be_active() {
        assert_eq!(
            compose(None, "c1", &ann(), "hi", Utc::now()).unwrap_err(),
            ComposeError::NoActiveConversation
        );
        assert_eq!(
            compose(Some("c2"), "c1", &ann(), "hi", Utc::now()).unwrap_err(),
            ComposeError::NoActiveConversation
        );
    }

    #[test]
    fn builds_frame_and_pending_echo_with_trimmed_text() {
        let composed = compose(Some("c1"), "c1", &ann(), "  hello  ", Utc::now()).unwrap();
        let ClientFrame::Message {
            conversation_id,
            author_id,
            text,
            client_id,
        } = &composed.frame
        else {
            panic!("expected message frame");
        };
        assert_eq!(conversation_id, "c1");
        assert_eq!(author_id, "u1");
        assert_eq!(text, "hello");
        assert_eq!(client_id.as_deref(), Some(composed.pending.id.as_str()));
        assert_eq!(composed.pending.text, "hello");
        assert_eq!(composed.pending.delivery, MessageDeliveryState::Pending);
    }

    #[test]
    fn provisional_ids_are_unique() {
        let a = compose(Some("c1"), "c1", &ann(), "x", Utc::now()).unwrap();
        let b = compose(Some("c1"), "c1", &ann(), "x", Utc::now()).unwrap();
        assert_ne!(a.pending.id, b.pending.id);
    }
}
