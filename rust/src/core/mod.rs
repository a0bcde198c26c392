mod composer;
mod config;
mod connection;
mod conversations;
mod notify;
mod projection;
mod rooms;
mod session;
mod store;
mod unread;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use flume::Sender;

use crate::actions::AppAction;
use crate::backend::Backend;
use crate::error::SessionError;
use crate::protocol::{ClientFrame, InboundMessage};
use crate::state::{AppState, MessageDeliveryState, UserRef};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};
use crate::Services;

use connection::{SessionTransport, TransportEvent};
use notify::NotificationDispatcher;
use rooms::RoomMembership;
use store::{ConversationStore, Ingest};
use unread::UnreadCounts;

pub(crate) use config::{load_app_config, AppConfig};

/// Credentials and identity of the logged-in user. Present only between Login and Logout.
#[derive(Debug, Clone)]
struct Session {
    credential: String,
    me: UserRef,
}

pub struct AppCore {
    pub state: AppState,
    rev: u64,
    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,
    runtime: tokio::runtime::Runtime,
    backend: Arc<dyn Backend>,
    transport: SessionTransport,
    session: Option<Session>,
    // Bumped on every login and teardown; CRUD results tagged with an older token are dropped.
    session_token: u64,
    active_conversation_id: Option<String>,
    store: ConversationStore,
    unread: UnreadCounts,
    rooms: RoomMembership,
    notifications: NotificationDispatcher,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
        services: Option<Services>,
    ) -> Self {
        let config = config::load_app_config(&data_dir);
        let services = services.unwrap_or_else(|| Services::from_config(&config));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("koomind-io")
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        tracing::debug!(
            sound = config.notification_sound(),
            desktop = config.desktop_notifications(),
            "core starting"
        );

        let this = Self {
            state: AppState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            runtime,
            backend: services.backend,
            transport: SessionTransport::new(services.connector),
            session: None,
            session_token: 0,
            active_conversation_id: None,
            store: ConversationStore::new(config.reconcile_window()),
            unread: UnreadCounts::default(),
            rooms: RoomMembership::default(),
            notifications: NotificationDispatcher::new(
                services.notifier,
                config.notification_sound(),
                config.desktop_notifications(),
            ),
        };
        this.commit_state_snapshot(&this.state);
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.refresh_projection();
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Stays in state until the UI clears it.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    fn credential(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.credential.clone())
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(action) => {
                // Never log `?action`: Login carries the credential.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
            CoreMsg::Shutdown => self.stop_session(),
        }
    }

    /// Close the session and stop the I/O runtime. Called once when the actor exits.
    pub fn shutdown(mut self) {
        self.stop_session();
        let AppCore { runtime, .. } = self;
        runtime.shutdown_timeout(Duration::from_millis(500));
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::Login {
                credential,
                user_id,
                user_name,
            } => self.login(credential, UserRef::new(user_id, user_name)),
            AppAction::Logout => {
                self.stop_session();
                self.emit_state();
            }
            AppAction::Reconnect => self.reconnect(),
            AppAction::OpenConversation { conversation_id } => {
                if !self.is_logged_in() {
                    return;
                }
                if !self.store.contains(&conversation_id) {
                    self.toast("Conversation not found");
                    return;
                }
                self.set_active(Some(conversation_id));
                self.emit_state();
            }
            AppAction::CloseConversation => {
                self.set_active(None);
                self.emit_state();
            }
            AppAction::RefreshConversations => {
                if self.is_logged_in() {
                    self.fetch_conversations();
                    self.emit_state();
                }
            }
            AppAction::CreateChannel {
                name,
                participant_ids,
            } => self.create_channel(name, participant_ids),
            AppAction::CreateDirect { participant_id } => self.create_direct(participant_id),
            AppAction::DeleteChannel { conversation_id } => {
                self.delete_conversation(conversation_id)
            }
            AppAction::SendMessage {
                conversation_id,
                text,
            } => self.send_message(&conversation_id, &text),
            AppAction::RetryMessage {
                conversation_id,
                message_id,
            } => self.retry_message(&conversation_id, &message_id),
            AppAction::ClearToast => {
                if self.state.toast.take().is_some() {
                    self.emit_state();
                }
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::LinkOpened { epoch, outbound } => {
                self.transport.on_link_opened(epoch, outbound);
            }
            InternalEvent::LinkFailed { epoch, error } => {
                if let Some(event) = self.transport.on_link_failed(epoch, error) {
                    self.handle_transport_event(event);
                }
            }
            InternalEvent::Link { epoch, event } => {
                if let Some(event) = self.transport.on_link_event(epoch, event) {
                    self.handle_transport_event(event);
                }
            }
            InternalEvent::ConversationsLoaded { token, result } => {
                self.on_conversations_loaded(token, result)
            }
            InternalEvent::UsersLoaded { token, result } => self.on_users_loaded(token, result),
            InternalEvent::ConversationCreated { token, result } => {
                self.on_conversation_created(token, result)
            }
            InternalEvent::ConversationDeleted {
                token,
                conversation_id,
                result,
            } => self.on_conversation_deleted(token, conversation_id, result),
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionEstablished { session_id } => {
                tracing::info!(%session_id, "session connected");
                // Server-side membership starts empty on every connection.
                let frames = self.rooms.rejoin(self.active_conversation_id.as_deref());
                self.send_frames(frames);
                self.emit_state();
            }
            TransportEvent::MessageReceived(inbound) => self.ingest(inbound),
            TransportEvent::ConnectionError(SessionError::Authentication(reason)) => {
                tracing::warn!(%reason, "session rejected; logging out");
                self.stop_session();
                self.toast(format!("Signed out: {reason}"));
            }
            TransportEvent::ConnectionError(SessionError::Transport(reason)) => {
                self.rooms.reset();
                let failed = self.store.fail_pending(&reason);
                tracing::warn!(%reason, failed, "connection lost");
                self.emit_state();
            }
            TransportEvent::ConnectionError(SessionError::Server(reason)) => {
                tracing::warn!(%reason, "server error");
                self.toast(reason);
            }
        }
    }

    /// Store, unread and notification reactions for one inbound message, applied as a unit.
    fn ingest(&mut self, inbound: InboundMessage) {
        let conversation_id = inbound.conversation_id.clone();
        let message = inbound.to_message();
        let outcome =
            self.store
                .upsert_message(&conversation_id, message, inbound.client_id.as_deref());
        match &outcome {
            Ingest::Inserted => {}
            Ingest::Confirmed { provisional_id } => {
                tracing::debug!(%conversation_id, %provisional_id, id = %inbound.id, "send confirmed");
            }
            Ingest::Duplicate => {
                tracing::debug!(%conversation_id, id = %inbound.id, "duplicate message ignored");
                return;
            }
            Ingest::UnknownConversation => {
                tracing::debug!(%conversation_id, id = %inbound.id, "message for unknown conversation");
                return;
            }
        }
        if outcome.is_new() {
            // Read the active conversation now, not when the frame was received.
            let active = self.active_conversation_id.as_deref();
            self.unread.record_new_message(&conversation_id, active);
            let conv = self.store.get(&conversation_id);
            if let Some((conv, msg)) = conv.and_then(|c| c.messages.last().map(|m| (c, m))) {
                let fired = self.notifications.dispatch(conv, msg, active);
                tracing::debug!(%conversation_id, cue = fired.cue, desktop = fired.desktop, "new message");
            }
        }
        self.emit_state();
    }

    /// Switch the active conversation: leave/join on the connection, then mark read.
    fn set_active(&mut self, next: Option<String>) {
        if self.active_conversation_id != next {
            self.active_conversation_id = next;
            if self.transport.is_connected() {
                let frames = self.rooms.transition(self.active_conversation_id.as_deref());
                self.send_frames(frames);
            } else {
                // Re-established by `rejoin` once connected.
                self.rooms.reset();
            }
            tracing::debug!(room = ?self.rooms.subscribed(), "active conversation changed");
        }
        if let Some(id) = self.active_conversation_id.as_deref() {
            self.unread.mark_read(id);
        }
    }

    fn send_frames(&mut self, frames: Vec<ClientFrame>) {
        for frame in frames {
            self.transport.send(frame);
        }
    }

    fn send_message(&mut self, conversation_id: &str, text: &str) {
        let Some(me) = self.session.as_ref().map(|s| s.me.clone()) else {
            return;
        };
        let composed = match composer::compose(
            self.active_conversation_id.as_deref(),
            conversation_id,
            &me,
            text,
            crate::state::now(),
        ) {
            Ok(composed) => composed,
            Err(e) => {
                tracing::debug!(%e, "send rejected");
                return;
            }
        };
        if !self.transport.send(composed.frame) {
            self.toast("Not connected; message not sent");
            return;
        }
        if self.store.insert_pending(composed.pending) {
            self.emit_state();
        }
    }

    fn retry_message(&mut self, conversation_id: &str, message_id: &str) {
        let Some(author_id) = self.session.as_ref().map(|s| s.me.id.clone()) else {
            return;
        };
        let Some(msg) = self.store.find_message(conversation_id, message_id) else {
            return;
        };
        if !matches!(msg.delivery, MessageDeliveryState::Failed { .. }) {
            return;
        }
        let frame = composer::message_frame(conversation_id, &author_id, &msg.text, &msg.id);
        if !self.transport.send(frame) {
            self.toast("Not connected; message not sent");
            return;
        }
        self.store
            .set_delivery(conversation_id, message_id, MessageDeliveryState::Pending);
        self.emit_state();
    }
}
