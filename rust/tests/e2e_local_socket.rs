// End-to-end over a real WebSocket: WsConnector against a local tokio-tungstenite endpoint.

mod support;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use koomind_core::{
    App, AppAction, AuthState, ConnectionStatus, MessageDeliveryState, NotificationPermission,
    Services, WsConnector,
};
use serde_json::json;
use support::helpers::*;
use support::mocks::*;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct EndpointState {
    // Raw text frames received from clients, in order.
    received: Vec<String>,
    authorization: Vec<String>,
    // Per-connection push channel, used to close from the test.
    conns: Vec<mpsc::UnboundedSender<Message>>,
}

struct LocalEndpoint {
    url: String,
    state: Arc<Mutex<EndpointState>>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl LocalEndpoint {
    fn received_types(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .received
            .iter()
            .filter_map(|t| serde_json::from_str::<serde_json::Value>(t).ok())
            .filter_map(|v| v["type"].as_str().map(ToString::to_string))
            .collect()
    }

    fn close_all(&self) {
        for tx in &self.state.lock().unwrap().conns {
            let _ = tx.send(Message::Close(None));
        }
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Reply to a client `message` frame the way the messaging endpoint broadcasts it back.
fn broadcast_for(frame: &serde_json::Value, id: u64) -> Option<String> {
    if frame["type"] != "message" {
        return None;
    }
    let v = json!({
        "type": "message",
        "id": format!("srv-{id}"),
        "conversationId": frame["conversationId"],
        "author": { "id": frame["authorId"], "name": "Me" },
        "text": frame["text"],
        "createdAt": chrono::Utc::now().to_rfc3339(),
        "clientId": frame["clientId"],
    });
    Some(v.to_string())
}

fn start_endpoint(accepted_token: &'static str) -> LocalEndpoint {
    let state = Arc::new(Mutex::new(EndpointState::default()));
    let (url_tx, url_rx) = std::sync::mpsc::channel::<(String, oneshot::Sender<()>)>();

    let state_for_thread = state.clone();
    let thread = std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");

        rt.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind endpoint");
            let addr: SocketAddr = listener.local_addr().expect("local addr");
            let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
            url_tx.send((format!("ws://{addr}/ws"), shutdown_tx)).unwrap();
            let next_id = Arc::new(AtomicU64::new(1));
            let state = state_for_thread;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accept = listener.accept() => {
                        let Ok((stream, _)) = accept else { continue };
                        let state = state.clone();
                        let next_id = next_id.clone();
                        tokio::spawn(async move {
                            let auth_state = state.clone();
                            let check = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                                let auth = req
                                    .headers()
                                    .get("authorization")
                                    .and_then(|v| v.to_str().ok())
                                    .unwrap_or_default()
                                    .to_string();
                                auth_state.lock().unwrap().authorization.push(auth.clone());
                                if auth == format!("Bearer {accepted_token}") {
                                    Ok(resp)
                                } else {
                                    let mut err = ErrorResponse::new(Some("unauthorized".to_string()));
                                    *err.status_mut() = StatusCode::UNAUTHORIZED;
                                    Err(err)
                                }
                            };
                            let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, check).await else {
                                return;
                            };
                            let (mut ws_tx, mut ws_rx) = ws.split();
                            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
                            state.lock().unwrap().conns.push(out_tx.clone());

                            let writer = tokio::spawn(async move {
                                while let Some(msg) = out_rx.recv().await {
                                    let closing = matches!(msg, Message::Close(_));
                                    if ws_tx.send(msg).await.is_err() || closing {
                                        break;
                                    }
                                }
                            });

                            let hello = json!({ "type": "connected", "sessionId": "local-1" });
                            let _ = out_tx.send(Message::Text(hello.to_string().into()));

                            while let Some(Ok(msg)) = ws_rx.next().await {
                                match msg {
                                    Message::Text(text) => {
                                        let text = text.to_string();
                                        state.lock().unwrap().received.push(text.clone());
                                        let Ok(frame) = serde_json::from_str::<serde_json::Value>(&text) else {
                                            continue;
                                        };
                                        if let Some(reply) = broadcast_for(&frame, next_id.fetch_add(1, Ordering::Relaxed)) {
                                            let _ = out_tx.send(Message::Text(reply.into()));
                                        }
                                    }
                                    Message::Close(_) => break,
                                    _ => {}
                                }
                            }
                            writer.abort();
                        });
                    }
                }
            }
        });
    });

    let (url, shutdown) = url_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    LocalEndpoint {
        url,
        state,
        shutdown: Some(shutdown),
        thread: Some(thread),
    }
}

fn app_for(endpoint: &LocalEndpoint, mocks: &Mocks) -> (Arc<App>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let services = Services {
        connector: Arc::new(WsConnector::new(endpoint.url.clone())),
        backend: mocks.backend.clone(),
        notifier: MockNotifier::new(NotificationPermission::Granted),
    };
    let app = App::with_services(dir.path().to_string_lossy().to_string(), services);
    (app, dir)
}

fn login(app: &App, token: &str) {
    app.dispatch(AppAction::Login {
        credential: token.into(),
        user_id: me().id,
        user_name: me().name,
    });
}

#[test]
fn send_round_trips_through_a_real_socket() {
    let endpoint = start_endpoint("token-1");
    let mocks = Mocks::new(vec![channel("c1", "general")], vec![me(), ann()]);
    let (app, _dir) = app_for(&endpoint, &mocks);
    login(&app, "token-1");

    wait_until("connected and joined", TIMEOUT, || {
        app.state().connection == ConnectionStatus::Connected
            && endpoint.received_types().contains(&"join".to_string())
    });
    assert_eq!(
        endpoint.state.lock().unwrap().authorization,
        vec!["Bearer token-1".to_string()]
    );

    app.dispatch(AppAction::SendMessage {
        conversation_id: "c1".into(),
        text: "hello".into(),
    });
    wait_until("broadcast confirmed", TIMEOUT, || {
        app.state().current_conversation.is_some_and(|c| {
            c.messages.len() == 1 && c.messages[0].delivery == MessageDeliveryState::Sent
        })
    });

    let view = app.state().current_conversation.unwrap();
    assert_eq!(view.messages[0].id, "srv-1");
    assert!(view.messages[0].is_mine);
    assert_eq!(endpoint.received_types(), vec!["join", "message"]);
}

#[test]
fn handshake_rejection_logs_out() {
    let endpoint = start_endpoint("token-1");
    let mocks = Mocks::new(vec![channel("c1", "general")], vec![]);
    let (app, _dir) = app_for(&endpoint, &mocks);
    login(&app, "wrong");

    wait_until("logged out", TIMEOUT, || {
        let s = app.state();
        s.auth == AuthState::LoggedOut && s.toast.is_some()
    });
    assert!(endpoint.received_types().is_empty());
}

#[test]
fn server_close_is_a_recoverable_transport_error() {
    let endpoint = start_endpoint("token-1");
    let mocks = Mocks::new(vec![channel("c1", "general")], vec![]);
    let (app, _dir) = app_for(&endpoint, &mocks);
    login(&app, "token-1");
    wait_until("joined", TIMEOUT, || {
        endpoint.received_types().contains(&"join".to_string())
    });

    endpoint.close_all();
    wait_until("errored", TIMEOUT, || {
        matches!(app.state().connection, ConnectionStatus::Errored { .. })
    });
    assert!(matches!(app.state().auth, AuthState::LoggedIn { .. }));

    app.dispatch(AppAction::Reconnect);
    wait_until("rejoined", TIMEOUT, || {
        app.state().connection == ConnectionStatus::Connected
            && endpoint
                .received_types()
                .iter()
                .filter(|t| *t == "join")
                .count()
                == 2
    });
}
