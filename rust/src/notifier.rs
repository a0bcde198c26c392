use std::io::Write;

use crate::error::NotifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub conversation_id: String,
    pub title: String,
    pub body: String,
}

/// Platform side of new-message notifications.
///
/// Called from the actor thread; implementations must not block.
pub trait Notifier: Send + Sync + 'static {
    fn request_permission(&self) -> NotificationPermission;
    fn play_cue(&self) -> Result<(), NotifyError>;
    fn show(&self, notification: &DesktopNotification) -> Result<(), NotifyError>;
}

/// Terminal bell for the cue; desktop notifications go to the log.
#[derive(Debug, Clone, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn play_cue(&self) -> Result<(), NotifyError> {
        let mut err = std::io::stderr();
        err.write_all(b"\x07")
            .and_then(|_| err.flush())
            .map_err(|e| NotifyError::Audio(e.to_string()))
    }

    fn show(&self, notification: &DesktopNotification) -> Result<(), NotifyError> {
        tracing::info!(
            conversation_id = %notification.conversation_id,
            title = %notification.title,
            body = %notification.body,
            "desktop notification"
        );
        Ok(())
    }
}
