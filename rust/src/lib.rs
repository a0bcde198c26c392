mod actions;
mod backend;
mod core;
mod error;
mod logging;
mod notifier;
mod protocol;
mod state;
mod transport;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use backend::{Backend, HttpBackend, NewConversation};
pub use error::*;
pub use notifier::*;
pub use protocol::*;
pub use state::*;
pub use transport::{Connector, Link, LinkEvent, WsConnector};
pub use updates::*;

/// Install the tracing subscriber (file in `data_dir`, `RUST_LOG` honoured). Safe to call
/// more than once; later calls are no-ops.
pub fn init_logging(data_dir: &str) {
    logging::init_logging(data_dir);
}

pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

/// External collaborators the engine talks to. Swapped for mocks in tests.
#[derive(Clone)]
pub struct Services {
    pub connector: Arc<dyn Connector>,
    pub backend: Arc<dyn Backend>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Production collaborators for the endpoints configured in `data_dir`
    /// (`koomind_config.json`, then `KOOMIND_*` env overrides, then defaults).
    pub fn from_data_dir(data_dir: &str) -> Self {
        Self::from_config(&core::load_app_config(data_dir))
    }

    pub(crate) fn from_config(config: &core::AppConfig) -> Self {
        Self {
            connector: Arc::new(WsConnector::new(config.socket_url())),
            backend: Arc::new(HttpBackend::new(config.api_base_url())),
            notifier: Arc::new(TerminalNotifier),
        }
    }
}

pub struct App {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
}

impl App {
    pub fn new(data_dir: String) -> Arc<Self> {
        Self::spawn(data_dir, None)
    }

    pub fn with_services(data_dir: String, services: Services) -> Arc<Self> {
        Self::spawn(data_dir, Some(services))
    }

    fn spawn(data_dir: String, services: Option<Services>) -> Arc<Self> {
        logging::init_logging(&data_dir);
        tracing::info!(data_dir = %data_dir, "App::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                services,
            );
            while let Ok(msg) = core_rx.recv() {
                if matches!(msg, CoreMsg::Shutdown) {
                    break;
                }
                core.handle_message(msg);
            }
            core.shutdown();
            tracing::info!("app actor stopped");
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
        })
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.core_tx.send(CoreMsg::Shutdown);
    }
}
