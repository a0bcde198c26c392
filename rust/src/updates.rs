use tokio::sync::mpsc::UnboundedSender;

use crate::error::{BackendError, SessionError};
use crate::protocol::ClientFrame;
use crate::state::{AppState, Conversation, UserRef};
use crate::transport::LinkEvent;
use crate::AppAction;

#[derive(Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
    Shutdown,
}

/// Results of async work, re-queued onto the actor so they apply in arrival order.
///
/// `epoch` tags transport events with the connection attempt they belong to;
/// `token` tags CRUD results with the login session that requested them.
#[derive(Debug)]
pub enum InternalEvent {
    // Transport
    LinkOpened {
        epoch: u64,
        outbound: UnboundedSender<ClientFrame>,
    },
    LinkFailed {
        epoch: u64,
        error: SessionError,
    },
    Link {
        epoch: u64,
        event: LinkEvent,
    },

    // CRUD results
    ConversationsLoaded {
        token: u64,
        result: Result<Vec<Conversation>, BackendError>,
    },
    UsersLoaded {
        token: u64,
        result: Result<Vec<UserRef>, BackendError>,
    },
    ConversationCreated {
        token: u64,
        result: Result<Conversation, BackendError>,
    },
    ConversationDeleted {
        token: u64,
        conversation_id: String,
        result: Result<(), BackendError>,
    },
}
