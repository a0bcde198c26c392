use std::sync::Mutex;

use anyhow::{anyhow, bail};
use koomind_core::{
    AppAction, AppReconciler, AppState, AppUpdate, ChatMessage, ConnectionStatus,
    MessageDeliveryState,
};

#[derive(Debug)]
pub enum Input {
    Quit,
    Help,
    List,
    Users,
    Action(AppAction),
    Text(String),
}

pub fn parse_command(line: &str) -> anyhow::Result<Input> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Text(line.to_string()));
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();
    let required = |what: &str| -> anyhow::Result<String> {
        if arg.is_empty() {
            bail!("usage: /{cmd} <{what}>");
        }
        Ok(arg.to_string())
    };

    let input = match cmd {
        "quit" | "q" => Input::Quit,
        "help" | "h" => Input::Help,
        "list" | "ls" => Input::List,
        "users" => Input::Users,
        "open" => Input::Action(AppAction::OpenConversation {
            conversation_id: required("conversation id")?,
        }),
        "close" => Input::Action(AppAction::CloseConversation),
        "refresh" => Input::Action(AppAction::RefreshConversations),
        "reconnect" => Input::Action(AppAction::Reconnect),
        "delete" => Input::Action(AppAction::DeleteChannel {
            conversation_id: required("conversation id")?,
        }),
        "dm" => Input::Action(AppAction::CreateDirect {
            participant_id: required("user id")?,
        }),
        "channel" => {
            let spec = required("name> <user id,...")?;
            let (name, ids) = spec
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: /channel <name> <user id,...>"))?;
            Input::Action(AppAction::CreateChannel {
                name: name.trim().to_string(),
                participant_ids: ids
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            })
        }
        "retry" => {
            let spec = required("conversation id> <message id")?;
            let (conversation_id, message_id) = spec
                .split_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: /retry <conversation id> <message id>"))?;
            Input::Action(AppAction::RetryMessage {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.trim().to_string(),
            })
        }
        other => bail!("unknown command /{other}"),
    };
    Ok(input)
}

pub fn print_help() {
    println!("  /list                      conversations and unread counts");
    println!("  /open <id>                 switch the active conversation");
    println!("  /close                     leave the active conversation");
    println!("  /users                     users you can add");
    println!("  /channel <name> <id,...>   create a channel");
    println!("  /dm <user id>              open a private conversation");
    println!("  /delete <id>               delete a channel");
    println!("  /retry <conv id> <msg id>  resend a failed message");
    println!("  /refresh  /reconnect  /quit");
    println!("  anything else is sent to the active conversation");
}

pub fn print_conversation_list(state: &AppState) {
    if state.conversation_list.is_empty() {
        println!("  (no conversations)");
    }
    for c in &state.conversation_list {
        let marker = if c.is_active { '*' } else { ' ' };
        let unread = if c.unread_count > 0 {
            format!(" ({} unread)", c.unread_count)
        } else {
            String::new()
        };
        println!("{marker} {}  {}{unread}", c.conversation_id, c.title);
    }
}

fn format_message(msg: &ChatMessage) -> String {
    let status = match &msg.delivery {
        MessageDeliveryState::Pending => " …",
        MessageDeliveryState::Sent => "",
        MessageDeliveryState::Failed { .. } => " [failed]",
    };
    let who = if msg.is_mine {
        "you"
    } else {
        msg.author_name.as_str()
    };
    format!("<{who}> {}{status}", msg.text)
}

#[derive(Debug, Default)]
struct Seen {
    rev: u64,
    connection: Option<ConnectionStatus>,
    conversation_id: Option<String>,
    // (id, delivery) of every message already printed for the open conversation.
    printed: Vec<(String, MessageDeliveryState)>,
    toast: Option<String>,
}

/// Prints state changes as they arrive: connection transitions, toasts and new messages
/// in the open conversation.
#[derive(Debug, Default)]
pub struct Printer {
    seen: Mutex<Seen>,
}

impl AppReconciler for Printer {
    fn reconcile(&self, update: AppUpdate) {
        let AppUpdate::FullState(state) = update;
        let mut seen = match self.seen.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        if state.rev <= seen.rev {
            return;
        }
        seen.rev = state.rev;

        if seen.connection.as_ref() != Some(&state.connection) {
            match &state.connection {
                ConnectionStatus::Connected => println!("-- connected"),
                ConnectionStatus::Connecting => println!("-- connecting"),
                ConnectionStatus::Disconnected => println!("-- disconnected"),
                ConnectionStatus::Errored { reason } => {
                    println!("-- connection error: {reason} (/reconnect to retry)")
                }
            }
            seen.connection = Some(state.connection.clone());
        }

        if state.toast != seen.toast {
            if let Some(toast) = &state.toast {
                println!("! {toast}");
            }
            seen.toast = state.toast.clone();
        }

        let Some(current) = state.current_conversation.as_ref() else {
            seen.conversation_id = None;
            seen.printed.clear();
            return;
        };
        if seen.conversation_id.as_deref() != Some(current.conversation_id.as_str()) {
            println!("== {} ==", current.title);
            seen.conversation_id = Some(current.conversation_id.clone());
            seen.printed.clear();
        }
        for msg in &current.messages {
            let known = seen.printed.iter().position(|(id, _)| id == &msg.id);
            match known {
                Some(idx) if seen.printed[idx].1 == msg.delivery => {}
                Some(idx) => {
                    if let MessageDeliveryState::Failed { reason } = &msg.delivery {
                        println!("! message {} failed: {reason}", msg.id);
                    }
                    seen.printed[idx].1 = msg.delivery.clone();
                }
                None => {
                    // A confirmed pending send changes id; match it by position instead.
                    let confirmed = seen
                        .printed
                        .iter()
                        .position(|(_, d)| *d == MessageDeliveryState::Pending);
                    match confirmed {
                        Some(idx)
                            if msg.is_mine && msg.delivery == MessageDeliveryState::Sent =>
                        {
                            seen.printed[idx] = (msg.id.clone(), msg.delivery.clone());
                        }
                        _ => {
                            println!("{}", format_message(msg));
                            seen.printed.push((msg.id.clone(), msg.delivery.clone()));
                        }
                    }
                }
            }
        }
    }
}
