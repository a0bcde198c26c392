mod render;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use koomind_core::{
    App, AppAction, AppState, AuthState, ConnectionStatus, HttpBackend, Services, WsConnector,
};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "koomind")]
#[command(about = "Terminal client for the Koomind messenger")]
struct Cli {
    /// Data directory (config file and log live here)
    #[arg(long, env = "KOOMIND_DATA_DIR", default_value = ".koomind")]
    data_dir: PathBuf,

    /// Bearer credential issued by the Koomind API
    #[arg(long, env = "KOOMIND_TOKEN", hide_env_values = true)]
    token: String,

    /// Id of the logged-in user
    #[arg(long, env = "KOOMIND_USER_ID")]
    user_id: String,

    /// Display name of the logged-in user
    #[arg(long, env = "KOOMIND_USER_NAME", default_value = "Me")]
    name: String,

    /// CRUD API base URL (overrides config file)
    #[arg(long, env = "KOOMIND_API_BASE_URL")]
    api_url: Option<String>,

    /// Messaging WebSocket URL (overrides config file)
    #[arg(long, env = "KOOMIND_SOCKET_URL")]
    socket_url: Option<String>,

    /// Seconds to wait for the session to come up
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat (default front-end)
    Chat,

    /// Print conversations with unread counts
    List {
        #[arg(long)]
        json: bool,
    },

    /// Print users available as participants
    Users,

    /// Send one message and wait for the server to confirm it
    Send {
        /// Conversation id
        #[arg(long)]
        conversation: String,

        /// Message text
        text: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("create data dir {}", cli.data_dir.display()))?;
    let data_dir = cli
        .data_dir
        .to_str()
        .ok_or_else(|| anyhow!("data dir is not valid UTF-8"))?
        .to_string();
    koomind_core::init_logging(&data_dir);

    let mut services = Services::from_data_dir(&data_dir);
    if let Some(url) = cli.api_url.as_deref() {
        services.backend = Arc::new(HttpBackend::new(url));
    }
    if let Some(url) = cli.socket_url.as_deref() {
        services.connector = Arc::new(WsConnector::new(url));
    }
    let app = App::with_services(data_dir, services);

    app.dispatch(AppAction::Login {
        credential: cli.token.clone(),
        user_id: cli.user_id.clone(),
        user_name: cli.name.clone(),
    });
    let timeout = Duration::from_secs(cli.timeout);

    match &cli.cmd {
        Command::Chat => cmd_chat(&app),
        Command::List { json } => cmd_list(&app, timeout, *json),
        Command::Users => cmd_users(&app, timeout),
        Command::Send { conversation, text } => cmd_send(&app, timeout, conversation, text),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn wait_for(
    app: &App,
    timeout: Duration,
    what: &str,
    mut f: impl FnMut(&AppState) -> bool,
) -> anyhow::Result<AppState> {
    let start = Instant::now();
    loop {
        let state = app.state();
        if state.auth == AuthState::LoggedOut && state.rev > 0 {
            let reason = state.toast.unwrap_or_else(|| "logged out".to_string());
            bail!("session ended: {reason}");
        }
        if f(&state) {
            return Ok(state);
        }
        if start.elapsed() >= timeout {
            bail!("timed out waiting for {what}");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn wait_loaded(app: &App, timeout: Duration) -> anyhow::Result<AppState> {
    wait_for(app, timeout, "conversations", |s| {
        matches!(s.auth, AuthState::LoggedIn { .. }) && !s.busy.loading_conversations && s.rev > 1
    })
}

// ── Commands ────────────────────────────────────────────────────────────────

fn cmd_list(app: &App, timeout: Duration, as_json: bool) -> anyhow::Result<()> {
    let state = wait_loaded(app, timeout)?;
    if as_json {
        let list: Vec<_> = state
            .conversation_list
            .iter()
            .map(|c| {
                json!({
                    "id": c.conversation_id,
                    "title": c.title,
                    "messages": c.message_count,
                    "unread": c.unread_count,
                    "last_message": c.last_message,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    render::print_conversation_list(&state);
    Ok(())
}

fn cmd_users(app: &App, timeout: Duration) -> anyhow::Result<()> {
    let state = wait_for(app, timeout, "users", |s| !s.users.is_empty())?;
    for user in &state.users {
        println!("{}  {}", user.id, user.name);
    }
    Ok(())
}

fn cmd_send(app: &App, timeout: Duration, conversation: &str, text: &str) -> anyhow::Result<()> {
    let state = wait_loaded(app, timeout)?;
    if !state
        .conversation_list
        .iter()
        .any(|c| c.conversation_id == conversation)
    {
        bail!("unknown conversation {conversation}");
    }
    app.dispatch(AppAction::OpenConversation {
        conversation_id: conversation.to_string(),
    });
    wait_for(app, timeout, "connection", |s| {
        s.connection == ConnectionStatus::Connected
            && s.current_conversation
                .as_ref()
                .is_some_and(|c| c.conversation_id == conversation)
    })?;

    let before = app
        .state()
        .current_conversation
        .map(|c| c.messages.len())
        .unwrap_or(0);
    app.dispatch(AppAction::SendMessage {
        conversation_id: conversation.to_string(),
        text: text.to_string(),
    });
    let state = wait_for(app, timeout, "delivery", |s| {
        s.current_conversation.as_ref().is_some_and(|c| {
            c.messages.len() > before
                && c.messages[before..]
                    .iter()
                    .any(|m| m.is_mine && m.delivery == koomind_core::MessageDeliveryState::Sent)
        })
    })?;
    if let Some(msg) = state
        .current_conversation
        .and_then(|c| c.messages.into_iter().rev().find(|m| m.is_mine))
    {
        println!("{}", msg.id);
    }
    Ok(())
}

fn cmd_chat(app: &Arc<App>) -> anyhow::Result<()> {
    app.listen_for_updates(Box::new(render::Printer::default()));
    println!("type /help for commands");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match render::parse_command(line) {
            Ok(render::Input::Quit) => break,
            Ok(render::Input::Help) => render::print_help(),
            Ok(render::Input::List) => render::print_conversation_list(&app.state()),
            Ok(render::Input::Users) => {
                for user in &app.state().users {
                    println!("  {}  {}", user.id, user.name);
                }
            }
            Ok(render::Input::Action(action)) => app.dispatch(action),
            Ok(render::Input::Text(text)) => {
                let state = app.state();
                let Some(current) = state.current_conversation else {
                    println!("! no conversation open (use /open <id>)");
                    continue;
                };
                app.dispatch(AppAction::SendMessage {
                    conversation_id: current.conversation_id,
                    text,
                });
            }
            Err(e) => println!("! {e}"),
        }
    }
    app.dispatch(AppAction::Logout);
    Ok(())
}
