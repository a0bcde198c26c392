// CRUD side effects: fetches and structural mutations go through the backend on the
// runtime and come back as `InternalEvent`s tagged with the session token.

use super::*;

use crate::backend::NewConversation;
use crate::error::BackendError;
use crate::state::{Conversation, ConversationKind};

impl AppCore {
    fn spawn_backend<F, Fut>(&self, credential: String, call: F)
    where
        F: FnOnce(Arc<dyn Backend>, String, u64) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = InternalEvent> + Send + 'static,
    {
        let backend = self.backend.clone();
        let tx = self.core_sender.clone();
        let token = self.session_token;
        self.runtime.spawn(async move {
            let event = call(backend, credential, token).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(event)));
        });
    }

    pub(super) fn fetch_conversations(&mut self) {
        let Some(credential) = self.credential() else {
            return;
        };
        self.state.busy.loading_conversations = true;
        self.spawn_backend(credential, |backend, credential, token| async move {
            let result = backend.list_conversations(&credential).await;
            InternalEvent::ConversationsLoaded { token, result }
        });
    }

    pub(super) fn fetch_users(&mut self) {
        let Some(credential) = self.credential() else {
            return;
        };
        self.spawn_backend(credential, |backend, credential, token| async move {
            let result = backend.list_users(&credential).await;
            InternalEvent::UsersLoaded { token, result }
        });
    }

    pub(super) fn create_channel(&mut self, name: String, participant_ids: Vec<String>) {
        if !self.is_logged_in() {
            return;
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            self.toast("Channel name is required");
            return;
        }
        if participant_ids.is_empty() {
            self.toast("Select at least one participant");
            return;
        }
        self.create_conversation(NewConversation::Channel {
            name,
            participant_ids,
        });
    }

    pub(super) fn create_direct(&mut self, participant_id: String) {
        if !self.is_logged_in() {
            return;
        }
        let participant_id = participant_id.trim().to_string();
        if participant_id.is_empty() {
            self.toast("Select a participant");
            return;
        }
        self.create_conversation(NewConversation::Direct { participant_id });
    }

    fn create_conversation(&mut self, request: NewConversation) {
        let Some(credential) = self.credential() else {
            return;
        };
        if self.state.busy.creating_conversation {
            tracing::debug!("create ignored; another create in flight");
            return;
        }
        self.state.busy.creating_conversation = true;
        self.spawn_backend(credential, |backend, credential, token| async move {
            let result = backend.create_conversation(&credential, request).await;
            InternalEvent::ConversationCreated { token, result }
        });
        self.emit_state();
    }

    pub(super) fn delete_conversation(&mut self, conversation_id: String) {
        let Some(credential) = self.credential() else {
            return;
        };
        match self.store.get(&conversation_id).map(|c| c.kind) {
            None => {
                self.toast("Conversation not found");
                return;
            }
            Some(ConversationKind::Direct) => {
                self.toast("Only channels can be deleted");
                return;
            }
            Some(ConversationKind::Channel) => {}
        }
        self.spawn_backend(credential, |backend, credential, token| async move {
            let result = backend
                .delete_conversation(&credential, &conversation_id)
                .await;
            InternalEvent::ConversationDeleted {
                token,
                conversation_id,
                result,
            }
        });
    }

    pub(super) fn on_conversations_loaded(
        &mut self,
        token: u64,
        result: Result<Vec<Conversation>, BackendError>,
    ) {
        if token != self.session_token {
            return;
        }
        self.state.busy.loading_conversations = false;
        let conversations = match result {
            Ok(list) => list,
            Err(e) => return self.on_backend_error(e, "Failed to load conversations"),
        };
        tracing::info!(count = conversations.len(), "conversations loaded");
        if self.store.is_empty() {
            self.store.load_all(conversations);
        } else {
            for gone in self.store.reload(conversations) {
                self.unread.forget(&gone);
            }
        }

        let keep = self
            .active_conversation_id
            .as_deref()
            .filter(|id| self.store.contains(id))
            .map(ToString::to_string);
        let next = keep.or_else(|| self.store.first_id());
        self.set_active(next);
        self.emit_state();
    }

    pub(super) fn on_users_loaded(
        &mut self,
        token: u64,
        result: Result<Vec<UserRef>, BackendError>,
    ) {
        if token != self.session_token {
            return;
        }
        let users = match result {
            Ok(users) => users,
            Err(e) => return self.on_backend_error(e, "Failed to load users"),
        };
        let me = self.session.as_ref().map(|s| s.me.id.clone());
        self.state.users = users
            .into_iter()
            .filter(|u| Some(&u.id) != me.as_ref())
            .collect();
        self.emit_state();
    }

    pub(super) fn on_conversation_created(
        &mut self,
        token: u64,
        result: Result<Conversation, BackendError>,
    ) {
        if token != self.session_token {
            return;
        }
        self.state.busy.creating_conversation = false;
        let conversation = match result {
            Ok(c) => c,
            Err(e) => return self.on_backend_error(e, "Failed to create conversation"),
        };
        let id = conversation.id.clone();
        if !self.store.add_conversation(conversation) {
            tracing::debug!(conversation_id = %id, "conversation already known");
        }
        self.set_active(Some(id));
        self.emit_state();
    }

    pub(super) fn on_conversation_deleted(
        &mut self,
        token: u64,
        conversation_id: String,
        result: Result<(), BackendError>,
    ) {
        if token != self.session_token {
            return;
        }
        if let Err(e) = result {
            return self.on_backend_error(e, "Failed to delete conversation");
        }
        self.store.remove_conversation(&conversation_id);
        self.unread.forget(&conversation_id);
        if self.active_conversation_id.as_deref() == Some(conversation_id.as_str()) {
            self.set_active(None);
        }
        self.emit_state();
    }

    fn on_backend_error(&mut self, error: BackendError, context: &str) {
        if error.is_unauthorized() {
            tracing::warn!(context, "backend rejected credential; logging out");
            self.stop_session();
            self.toast("Session expired; please log in again");
            return;
        }
        tracing::warn!(%error, context, "backend call failed");
        self.toast(format!("{context}: {error}"));
    }
}
