// CRUD collaborator: conversation and user listing, channel/direct creation, deletion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::BackendError;
use crate::state::{Conversation, ConversationKind, Message, MessageDeliveryState, UserRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewConversation {
    Channel {
        name: String,
        participant_ids: Vec<String>,
    },
    Direct {
        participant_id: String,
    },
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn list_conversations(&self, credential: &str)
        -> Result<Vec<Conversation>, BackendError>;

    async fn list_users(&self, credential: &str) -> Result<Vec<UserRef>, BackendError>;

    async fn create_conversation(
        &self,
        credential: &str,
        request: NewConversation,
    ) -> Result<Conversation, BackendError>;

    async fn delete_conversation(
        &self,
        credential: &str,
        conversation_id: &str,
    ) -> Result<(), BackendError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn checked(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(BackendError::Unauthorized);
        }
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        Err(BackendError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_conversations(
        &self,
        credential: &str,
    ) -> Result<Vec<Conversation>, BackendError> {
        let resp = self
            .http
            .get(self.url("/messenger/conversations"))
            .bearer_auth(credential)
            .send()
            .await?;
        let dtos: Vec<ConversationDto> = Self::checked(resp).await?.json().await?;
        Ok(dtos.into_iter().map(ConversationDto::into_conversation).collect())
    }

    async fn list_users(&self, credential: &str) -> Result<Vec<UserRef>, BackendError> {
        let resp = self
            .http
            .get(self.url("/users"))
            .bearer_auth(credential)
            .send()
            .await?;
        let dtos: Vec<UserDto> = Self::checked(resp).await?.json().await?;
        Ok(dtos.into_iter().map(UserDto::into_user_ref).collect())
    }

    async fn create_conversation(
        &self,
        credential: &str,
        request: NewConversation,
    ) -> Result<Conversation, BackendError> {
        let body = match request {
            NewConversation::Channel {
                name,
                participant_ids,
            } => serde_json::json!({
                "name": name,
                "type": "channel",
                "participants": participant_ids,
            }),
            NewConversation::Direct { participant_id } => serde_json::json!({
                "type": "private",
                "participantId": participant_id,
            }),
        };
        let resp = self
            .http
            .post(self.url("/messenger/conversations"))
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await?;
        let dto: ConversationDto = Self::checked(resp).await?.json().await?;
        Ok(dto.into_conversation())
    }

    async fn delete_conversation(
        &self,
        credential: &str,
        conversation_id: &str,
    ) -> Result<(), BackendError> {
        let resp = self
            .http
            .delete(self.url(&format!("/messenger/conversations/{conversation_id}")))
            .bearer_auth(credential)
            .send()
            .await?;
        Self::checked(resp).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl UserDto {
    fn into_user_ref(self) -> UserRef {
        UserRef {
            id: self.id,
            name: self.name.unwrap_or_else(|| "User".to_string()),
        }
    }
}

/// Authors arrive either populated or as a bare id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthorDto {
    Populated(UserDto),
    Id(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KindDto {
    Channel,
    #[serde(alias = "direct")]
    Private,
}

#[derive(Debug, Deserialize)]
struct MessageDto {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    #[serde(default)]
    author: Option<AuthorDto>,
    #[serde(default)]
    text: String,
    #[serde(rename = "createdAt", default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ConversationDto {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    #[serde(rename = "type")]
    kind: KindDto,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    participants: Vec<UserDto>,
    #[serde(default)]
    messages: Vec<MessageDto>,
}

impl ConversationDto {
    fn into_conversation(self) -> Conversation {
        let conversation_id = self.id;
        let participants: Vec<UserRef> = self
            .participants
            .into_iter()
            .map(UserDto::into_user_ref)
            .collect();
        let mut messages: Vec<Message> = Vec::with_capacity(self.messages.len());
        for m in self.messages {
            // History can contain repeats; keep the first occurrence of each id.
            if messages.iter().any(|existing| existing.id == m.id) {
                continue;
            }
            let author = match m.author {
                Some(AuthorDto::Populated(u)) => u.into_user_ref(),
                Some(AuthorDto::Id(id)) => participants
                    .iter()
                    .find(|p| p.id == id)
                    .cloned()
                    .unwrap_or(UserRef {
                        id,
                        name: "User".to_string(),
                    }),
                None => UserRef {
                    id: String::new(),
                    name: "User".to_string(),
                },
            };
            messages.push(Message {
                id: m.id,
                conversation_id: conversation_id.clone(),
                author,
                text: m.text,
                created_at: m.created_at.unwrap_or_else(Utc::now),
                delivery: MessageDeliveryState::Sent,
            });
        }
        Conversation {
            id: conversation_id,
            kind: match self.kind {
                KindDto::Channel => ConversationKind::Channel,
                KindDto::Private => ConversationKind::Direct,
            },
            name: self.name,
            participants,
            messages,
        }
    }
}
