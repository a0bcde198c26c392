#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use koomind_core::{
    AppReconciler, AppUpdate, Conversation, ConversationKind, InboundMessage, ServerFrame,
    UserRef, WireUser,
};

pub fn wait_until(what: &str, timeout: Duration, f: impl FnMut() -> bool) {
    wait_until_with_poll(what, timeout, Duration::from_millis(20), f);
}

pub fn wait_until_with_poll(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut f: impl FnMut() -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(poll);
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub fn write_config(data_dir: &str, v: serde_json::Value) {
    let path = std::path::Path::new(data_dir).join("koomind_config.json");
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

#[derive(Clone)]
pub struct Collector(pub Arc<Mutex<Vec<AppUpdate>>>);

impl Collector {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(vec![])))
    }

    pub fn revs(&self) -> Vec<u64> {
        self.0.lock().unwrap().iter().map(AppUpdate::rev).collect()
    }
}

impl AppReconciler for Collector {
    fn reconcile(&self, update: AppUpdate) {
        self.0.lock().unwrap().push(update);
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

pub fn ann() -> UserRef {
    UserRef::new("u1", "Ann")
}

pub fn bob() -> UserRef {
    UserRef::new("u2", "Bob")
}

pub fn me() -> UserRef {
    UserRef::new("me", "Me")
}

pub fn channel(id: &str, name: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        kind: ConversationKind::Channel,
        name: Some(name.to_string()),
        participants: vec![me(), ann(), bob()],
        messages: vec![],
    }
}

pub fn direct(id: &str, other: UserRef) -> Conversation {
    Conversation {
        id: id.to_string(),
        kind: ConversationKind::Direct,
        name: None,
        participants: vec![me(), other],
        messages: vec![],
    }
}

pub fn inbound(id: &str, conversation_id: &str, author: &UserRef, text: &str) -> ServerFrame {
    ServerFrame::Message(InboundMessage {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        author: WireUser {
            id: author.id.clone(),
            name: Some(author.name.clone()),
        },
        text: text.to_string(),
        created_at: Utc::now(),
        client_id: None,
    })
}

pub fn echo(
    id: &str,
    conversation_id: &str,
    author: &UserRef,
    text: &str,
    client_id: Option<&str>,
) -> ServerFrame {
    let ServerFrame::Message(mut msg) = inbound(id, conversation_id, author, text) else {
        unreachable!();
    };
    msg.client_id = client_id.map(ToString::to_string);
    ServerFrame::Message(msg)
}
