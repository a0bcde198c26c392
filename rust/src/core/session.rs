// Session lifecycle: login, reconnect and teardown.

use super::*;

use crate::state::{AuthState, BusyState};

impl AppCore {
    pub(super) fn login(&mut self, credential: String, me: UserRef) {
        if self.is_logged_in() {
            self.stop_session();
        }
        if credential.trim().is_empty() {
            tracing::warn!("login without credential");
            self.toast("Authentication failed: missing credential");
            return;
        }

        tracing::info!(user_id = %me.id, "login");
        self.session_token = self.session_token.wrapping_add(1);
        self.session = Some(Session {
            credential,
            me: me.clone(),
        });
        self.state.auth = AuthState::LoggedIn { user: me };
        self.notifications.arm();

        self.open_transport();
        if !self.is_logged_in() {
            // Rejected synchronously; teardown already emitted.
            return;
        }
        self.fetch_conversations();
        self.fetch_users();
        self.emit_state();
    }

    pub(super) fn reconnect(&mut self) {
        if !self.is_logged_in() {
            return;
        }
        if self.transport.status().is_live() {
            tracing::debug!("reconnect ignored; connection live");
            return;
        }
        self.open_transport();
        if self.is_logged_in() {
            self.emit_state();
        }
    }

    fn open_transport(&mut self) {
        let Some(credential) = self.credential() else {
            return;
        };
        let result = self
            .transport
            .connect(&self.runtime, &credential, self.core_sender.clone());
        if let Err(error) = result {
            self.handle_transport_event(TransportEvent::ConnectionError(error));
        }
    }

    /// Tear the session down. Idempotent: the connection is closed at most once.
    pub(super) fn stop_session(&mut self) {
        self.session_token = self.session_token.wrapping_add(1);
        if self.session.take().is_some() {
            tracing::info!("session stopped");
        }
        self.transport.disconnect();
        // No Leave needed: membership ends with the connection.
        self.rooms.reset();
        self.store.clear();
        self.unread.clear();
        self.active_conversation_id = None;

        self.state.auth = AuthState::LoggedOut;
        self.state.users.clear();
        self.state.busy = BusyState::idle();
    }
}
