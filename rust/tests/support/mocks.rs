#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use koomind_core::{
    Backend, BackendError, ClientFrame, Connector, Conversation, ConversationKind,
    DesktopNotification, Link, LinkEvent, NewConversation, NotificationPermission, Notifier,
    NotifyError, ServerFrame, Services, SessionError, UserRef,
};
use tokio::sync::mpsc;

/// Far end of one mock connection.
pub struct Remote {
    frames: Mutex<mpsc::UnboundedReceiver<ClientFrame>>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl Remote {
    pub fn push(&self, frame: ServerFrame) {
        let _ = self.events.send(LinkEvent::Frame(frame));
    }

    pub fn close(&self, reason: Option<&str>) {
        let _ = self.events.send(LinkEvent::Closed {
            reason: reason.map(ToString::to_string),
        });
    }

    /// Frames sent by the client so far, in order.
    pub fn drain(&self) -> Vec<ClientFrame> {
        let mut rx = self.frames.lock().unwrap();
        let mut out = vec![];
        while let Ok(frame) = rx.try_recv() {
            out.push(frame);
        }
        out
    }

    /// True once the client dropped its side of the link.
    pub fn client_closed(&self) -> bool {
        let mut rx = self.frames.lock().unwrap();
        matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        )
    }
}

pub struct MockConnector {
    pub connects: AtomicUsize,
    pub reject: Mutex<Option<SessionError>>,
    pub auto_connected: AtomicBool,
    remotes: Mutex<Vec<Arc<Remote>>>,
    credentials: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            reject: Mutex::new(None),
            auto_connected: AtomicBool::new(true),
            remotes: Mutex::new(vec![]),
            credentials: Mutex::new(vec![]),
        })
    }

    pub fn rejecting(error: SessionError) -> Arc<Self> {
        let this = Self::new();
        *this.reject.lock().unwrap() = Some(error);
        this
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn remote(&self, idx: usize) -> Arc<Remote> {
        self.remotes.lock().unwrap()[idx].clone()
    }

    pub fn last_credential(&self) -> Option<String> {
        self.credentials.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, credential: &str) -> Result<Link, SessionError> {
        self.credentials.lock().unwrap().push(credential.to_string());
        let rejection = self.reject.lock().unwrap().clone();
        if let Some(err) = rejection {
            self.connects.fetch_add(1, Ordering::SeqCst);
            return Err(err);
        }
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        {
            let mut remotes = self.remotes.lock().unwrap();
            if self.auto_connected.load(Ordering::SeqCst) {
                let _ = in_tx.send(LinkEvent::Frame(ServerFrame::Connected {
                    session_id: format!("s{}", remotes.len() + 1),
                }));
            }
            remotes.push(Arc::new(Remote {
                frames: Mutex::new(out_rx),
                events: in_tx,
            }));
        }
        // Counted last so a test that saw the count can always reach the remote.
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

pub struct MockBackend {
    pub conversations: Mutex<Vec<Conversation>>,
    pub users: Mutex<Vec<UserRef>>,
    pub unauthorized: AtomicBool,
    pub created: Mutex<Vec<NewConversation>>,
    pub deleted: Mutex<Vec<String>>,
    // Returned by the next create instead of a fresh conversation.
    pub create_returns: Mutex<Option<Conversation>>,
    next_id: AtomicUsize,
}

impl MockBackend {
    pub fn new(conversations: Vec<Conversation>, users: Vec<UserRef>) -> Arc<Self> {
        Arc::new(Self {
            conversations: Mutex::new(conversations),
            users: Mutex::new(users),
            unauthorized: AtomicBool::new(false),
            created: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
            create_returns: Mutex::new(None),
            next_id: AtomicUsize::new(1),
        })
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(BackendError::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_conversations(
        &self,
        _credential: &str,
    ) -> Result<Vec<Conversation>, BackendError> {
        self.check()?;
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn list_users(&self, _credential: &str) -> Result<Vec<UserRef>, BackendError> {
        self.check()?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn create_conversation(
        &self,
        _credential: &str,
        request: NewConversation,
    ) -> Result<Conversation, BackendError> {
        self.check()?;
        self.created.lock().unwrap().push(request.clone());
        if let Some(conv) = self.create_returns.lock().unwrap().take() {
            return Ok(conv);
        }
        let id = format!("new{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let conv = match request {
            NewConversation::Channel {
                name,
                participant_ids,
            } => Conversation {
                id,
                kind: ConversationKind::Channel,
                name: Some(name),
                participants: participant_ids
                    .into_iter()
                    .map(|p| UserRef::new(p.clone(), p))
                    .collect(),
                messages: vec![],
            },
            NewConversation::Direct { participant_id } => Conversation {
                id,
                kind: ConversationKind::Direct,
                name: None,
                participants: vec![UserRef::new(participant_id.clone(), participant_id)],
                messages: vec![],
            },
        };
        self.conversations.lock().unwrap().push(conv.clone());
        Ok(conv)
    }

    async fn delete_conversation(
        &self,
        _credential: &str,
        conversation_id: &str,
    ) -> Result<(), BackendError> {
        self.check()?;
        self.deleted.lock().unwrap().push(conversation_id.to_string());
        Ok(())
    }
}

pub struct MockNotifier {
    pub permission: NotificationPermission,
    pub permission_requests: AtomicUsize,
    pub cues: AtomicUsize,
    pub shown: Mutex<Vec<DesktopNotification>>,
}

impl MockNotifier {
    pub fn new(permission: NotificationPermission) -> Arc<Self> {
        Arc::new(Self {
            permission,
            permission_requests: AtomicUsize::new(0),
            cues: AtomicUsize::new(0),
            shown: Mutex::new(vec![]),
        })
    }

    pub fn cue_count(&self) -> usize {
        self.cues.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<DesktopNotification> {
        self.shown.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    fn request_permission(&self) -> NotificationPermission {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.permission
    }

    fn play_cue(&self) -> Result<(), NotifyError> {
        self.cues.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn show(&self, notification: &DesktopNotification) -> Result<(), NotifyError> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct Mocks {
    pub connector: Arc<MockConnector>,
    pub backend: Arc<MockBackend>,
    pub notifier: Arc<MockNotifier>,
}

impl Mocks {
    pub fn new(conversations: Vec<Conversation>, users: Vec<UserRef>) -> Self {
        Self {
            connector: MockConnector::new(),
            backend: MockBackend::new(conversations, users),
            notifier: MockNotifier::new(NotificationPermission::Granted),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            connector: self.connector.clone(),
            backend: self.backend.clone(),
            notifier: self.notifier.clone(),
        }
    }
}
