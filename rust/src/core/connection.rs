// Session transport: owns the single live connection and translates link events.

use std::sync::Arc;

use flume::Sender;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::SessionError;
use crate::protocol::{ClientFrame, InboundMessage, ServerFrame};
use crate::state::ConnectionStatus;
use crate::transport::{Connector, LinkEvent};
use crate::updates::{CoreMsg, InternalEvent};

/// Typed events the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportEvent {
    ConnectionEstablished { session_id: String },
    MessageReceived(InboundMessage),
    ConnectionError(SessionError),
}

pub(crate) struct SessionTransport {
    connector: Arc<dyn Connector>,
    status: ConnectionStatus,
    outbound: Option<UnboundedSender<ClientFrame>>,
    // Bumped per connect attempt and on disconnect; events from older attempts are dropped.
    epoch: u64,
}

impl SessionTransport {
    pub(crate) fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            status: ConnectionStatus::Disconnected,
            outbound: None,
            epoch: 0,
        }
    }

    pub(crate) fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Start connecting. Returns `Ok(false)` when a connection is already open or opening.
    ///
    /// The outcome arrives later on `core_tx` as `LinkOpened`/`LinkFailed`, followed by
    /// the link's events.
    pub(crate) fn connect(
        &mut self,
        runtime: &tokio::runtime::Runtime,
        credential: &str,
        core_tx: Sender<CoreMsg>,
    ) -> Result<bool, SessionError> {
        if credential.trim().is_empty() {
            return Err(SessionError::Authentication("missing credential".to_string()));
        }
        if self.status.is_live() {
            tracing::debug!(status = ?self.status, "connect ignored; connection already live");
            return Ok(false);
        }

        self.epoch = self.epoch.wrapping_add(1);
        let epoch = self.epoch;
        self.status = ConnectionStatus::Connecting;

        let connector = self.connector.clone();
        let credential = credential.to_string();
        runtime.spawn(async move {
            let link = match connector.connect(&credential).await {
                Ok(link) => link,
                Err(error) => {
                    let _ = core_tx.send(CoreMsg::Internal(Box::new(InternalEvent::LinkFailed {
                        epoch,
                        error,
                    })));
                    return;
                }
            };
            let mut inbound = link.inbound;
            if core_tx
                .send(CoreMsg::Internal(Box::new(InternalEvent::LinkOpened {
                    epoch,
                    outbound: link.outbound,
                })))
                .is_err()
            {
                return;
            }
            let mut closed = false;
            while let Some(event) = inbound.recv().await {
                closed = matches!(event, LinkEvent::Closed { .. });
                if core_tx
                    .send(CoreMsg::Internal(Box::new(InternalEvent::Link { epoch, event })))
                    .is_err()
                    || closed
                {
                    break;
                }
            }
            if !closed {
                let _ = core_tx.send(CoreMsg::Internal(Box::new(InternalEvent::Link {
                    epoch,
                    event: LinkEvent::Closed { reason: None },
                })));
            }
        });
        Ok(true)
    }

    pub(crate) fn on_link_opened(&mut self, epoch: u64, outbound: UnboundedSender<ClientFrame>) {
        if epoch != self.epoch || self.status != ConnectionStatus::Connecting {
            // Stale attempt; dropping `outbound` closes it.
            return;
        }
        self.outbound = Some(outbound);
    }

    pub(crate) fn on_link_failed(
        &mut self,
        epoch: u64,
        error: SessionError,
    ) -> Option<TransportEvent> {
        if epoch != self.epoch {
            return None;
        }
        self.outbound = None;
        self.status = ConnectionStatus::Errored {
            reason: error.to_string(),
        };
        Some(TransportEvent::ConnectionError(error))
    }

    /// Translate a raw link event. Returns None for stale or ignorable events.
    pub(crate) fn on_link_event(&mut self, epoch: u64, event: LinkEvent) -> Option<TransportEvent> {
        if epoch != self.epoch || self.outbound.is_none() {
            return None;
        }
        match event {
            LinkEvent::Frame(ServerFrame::Connected { session_id }) => {
                self.status = ConnectionStatus::Connected;
                Some(TransportEvent::ConnectionEstablished { session_id })
            }
            LinkEvent::Frame(ServerFrame::Message(msg)) => {
                Some(TransportEvent::MessageReceived(msg))
            }
            LinkEvent::Frame(ServerFrame::Error { reason }) => {
                let mut error = SessionError::from_server_reason(&reason);
                if self.status == ConnectionStatus::Connecting && !error.is_fatal() {
                    // Refused before the handshake completed.
                    error = SessionError::Transport(reason);
                }
                if matches!(error, SessionError::Server(_)) {
                    return Some(TransportEvent::ConnectionError(error));
                }
                self.outbound = None;
                self.status = ConnectionStatus::Errored {
                    reason: error.to_string(),
                };
                Some(TransportEvent::ConnectionError(error))
            }
            LinkEvent::Closed { reason } => {
                self.outbound = None;
                let error = match reason {
                    Some(r) if SessionError::from_server_reason(&r).is_fatal() => {
                        SessionError::Authentication(r)
                    }
                    Some(r) => SessionError::Transport(r),
                    None => SessionError::Transport("connection closed".to_string()),
                };
                self.status = ConnectionStatus::Errored {
                    reason: error.to_string(),
                };
                Some(TransportEvent::ConnectionError(error))
            }
        }
    }

    /// Fire-and-forget. Dropped (returns false) unless connected.
    pub(crate) fn send(&self, frame: ClientFrame) -> bool {
        if !self.is_connected() {
            tracing::debug!(frame = frame.tag(), "send dropped; not connected");
            return false;
        }
        let Some(tx) = self.outbound.as_ref() else {
            return false;
        };
        let tag = frame.tag();
        if tx.send(frame).is_err() {
            tracing::warn!(frame = tag, "send dropped; link writer gone");
            return false;
        }
        true
    }

    /// Close the connection. Safe to call repeatedly; returns true only when something
    /// was actually released.
    pub(crate) fn disconnect(&mut self) -> bool {
        let was_open = self.outbound.is_some() || self.status.is_live();
        self.epoch = self.epoch.wrapping_add(1);
        self.outbound = None;
        self.status = ConnectionStatus::Disconnected;
        if was_open {
            tracing::info!("socket disconnected");
        }
        was_open
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
