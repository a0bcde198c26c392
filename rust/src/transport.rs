use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

use crate::error::SessionError;
use crate::protocol::{decode_server_frame, encode_client_frame, ClientFrame, ServerFrame};

/// Raw events delivered by an open link, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Frame(ServerFrame),
    /// The far end closed the connection or it failed. Always the last event of a link.
    Closed { reason: Option<String> },
}

/// One open bidirectional connection.
///
/// Dropping `outbound` closes the connection; `inbound` ends after a `LinkEvent::Closed`.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<ClientFrame>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Opens connections to the messaging endpoint.
///
/// Runs on the actor's tokio runtime; implementations may spawn their own I/O tasks.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, credential: &str) -> Result<Link, SessionError>;
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn classify_handshake_status(status: StatusCode) -> SessionError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SessionError::Authentication(format!("handshake rejected: {status}"))
    } else {
        SessionError::Transport(format!("handshake failed: {status}"))
    }
}

fn map_connect_error(err: WsError) -> SessionError {
    match err {
        WsError::Http(response) => classify_handshake_status(response.status()),
        other => SessionError::Transport(other.to_string()),
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, credential: &str) -> Result<Link, SessionError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::Transport(format!("invalid socket url: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| SessionError::Authentication("malformed credential".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        tracing::info!(url = %self.url, "socket connecting");
        let (ws, _response) = connect_async(request).await.map_err(map_connect_error)?;
        let (mut write, mut read) = ws.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<LinkEvent>();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let text = match encode_client_frame(&frame) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(%e, frame = frame.tag(), "encode outbound frame failed");
                        continue;
                    }
                };
                if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                    tracing::warn!(%e, frame = frame.tag(), "socket write failed");
                    break;
                }
            }
            // Sender dropped: release the connection.
            let _ = write.send(WsMessage::Close(None)).await;
            let _ = write.close().await;
            tracing::debug!("socket writer finished");
        });

        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(WsMessage::Text(text))) => match decode_server_frame(text.as_str()) {
                        Ok(frame) => {
                            if in_tx.send(LinkEvent::Frame(frame)).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(%e, "ignoring unrecognized frame");
                        }
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            let _ = in_tx.send(LinkEvent::Closed { reason });
        });

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
