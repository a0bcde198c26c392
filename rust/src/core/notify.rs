use std::sync::Arc;

use crate::notifier::{DesktopNotification, NotificationPermission, Notifier};
use crate::state::{Conversation, ConversationKind, Message};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NotificationOutcome {
    pub(crate) cue: bool,
    pub(crate) desktop: bool,
}

pub(crate) struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    // None until armed; permission is only ever requested once.
    permission: Option<NotificationPermission>,
    sound_enabled: bool,
    desktop_enabled: bool,
}

pub(crate) fn should_notify(message: &Message, active: Option<&str>) -> bool {
    active != Some(message.conversation_id.as_str())
}

pub(crate) fn desktop_notification(
    conversation: &Conversation,
    message: &Message,
) -> DesktopNotification {
    let title = match (conversation.kind, conversation.name.as_deref()) {
        (ConversationKind::Channel, Some(name)) => format!("New message in #{name}"),
        _ => "New message".to_string(),
    };
    let author = if message.author.name.trim().is_empty() {
        "User"
    } else {
        message.author.name.as_str()
    };
    DesktopNotification {
        conversation_id: conversation.id.clone(),
        title,
        body: format!("{author}: {}", message.text),
    }
}

impl NotificationDispatcher {
    pub(crate) fn new(
        notifier: Arc<dyn Notifier>,
        sound_enabled: bool,
        desktop_enabled: bool,
    ) -> Self {
        Self {
            notifier,
            permission: None,
            sound_enabled,
            desktop_enabled,
        }
    }

    pub(crate) fn arm(&mut self) {
        if self.permission.is_some() || !self.desktop_enabled {
            return;
        }
        let permission = self.notifier.request_permission();
        if permission == NotificationPermission::Denied {
            tracing::info!("desktop notifications denied; audible cue only");
        }
        self.permission = Some(permission);
    }

    /// React to one newly ingested message. `active` must be the active conversation at
    /// the moment the message is processed. Failures are logged and swallowed.
    pub(crate) fn dispatch(
        &mut self,
        conversation: &Conversation,
        message: &Message,
        active: Option<&str>,
    ) -> NotificationOutcome {
        let mut outcome = NotificationOutcome::default();
        if !should_notify(message, active) {
            return outcome;
        }
        self.arm();

        if self.sound_enabled {
            match self.notifier.play_cue() {
                Ok(()) => outcome.cue = true,
                Err(e) => tracing::warn!(%e, "notification cue failed"),
            }
        }

        if self.desktop_enabled && self.permission == Some(NotificationPermission::Granted) {
            let notification = desktop_notification(conversation, message);
            match self.notifier.show(&notification) {
                Ok(()) => outcome.desktop = true,
                Err(e) => tracing::warn!(%e, "desktop notification failed"),
            }
        }
        outcome
    }
}
