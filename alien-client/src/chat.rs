//! Chat transcripts for the project assistant, AlienGPT and the global chat.

use std::sync::Arc;

use alien_core::{ensure_can_mutate, NotificationCenter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::api_client::{ApiClientError, RestClient};
use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::types::{AiStatus, Visibility};

const ALIEN_GPT_FALLBACK: &str = "Failed to get response from AlienGPT";
const GLOBAL_FALLBACK: &str = "Sorry, I couldn't process that request. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Project { id: String, visibility: Visibility },
    AlienGpt,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    /// Extra reply fields, e.g. the projects AlienGPT consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ChatEntry {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
        }
    }
}

/// What one call to [`ChatSession::send`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTurn {
    /// Blank input; nothing was sent.
    Ignored,
    Replied(ChatEntry),
    /// The request failed. For the project assistant the user message has
    /// been withdrawn from the transcript; otherwise an entry was appended.
    Failed { message: String },
}

pub struct ChatSession {
    rest: RestClient,
    session: Arc<Session>,
    notifications: Arc<NotificationCenter>,
    target: ChatTarget,
    transcript: Vec<ChatEntry>,
    thread_id: Option<String>,
}

impl ChatSession {
    pub fn new(
        rest: RestClient,
        session: Arc<Session>,
        notifications: Arc<NotificationCenter>,
        target: ChatTarget,
    ) -> Self {
        Self {
            rest,
            session,
            notifications,
            target,
            transcript: Vec::new(),
            thread_id: None,
        }
    }

    pub fn target(&self) -> &ChatTarget {
        &self.target
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Start over with an empty transcript and no server thread.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.thread_id = None;
    }

    pub async fn send(&mut self, message: &str) -> ChatTurn {
        let message = message.trim();
        if message.is_empty() {
            return ChatTurn::Ignored;
        }
        self.transcript.push(ChatEntry::new(ChatRole::User, message));

        let thread_id = self.thread_id.clone();
        let result = match &self.target {
            ChatTarget::Project { id, visibility } => {
                self.rest
                    .project_chat(id, message, *visibility, thread_id.as_deref())
                    .await
            }
            ChatTarget::AlienGpt => self.rest.alien_gpt_chat(message, thread_id.as_deref()).await,
            ChatTarget::Global => self.rest.global_chat(message).await,
        };
        let result = self.session.check(result).await;

        match result {
            Ok(reply) => {
                if let Some(thread) = reply.thread_id {
                    self.thread_id = Some(thread);
                }
                let mut entry = ChatEntry::new(ChatRole::Assistant, reply.response);
                if !reply.extra.is_empty() {
                    entry.metadata = Some(reply.extra);
                }
                debug!(chat = ?self.target, thread = ?self.thread_id, "Chat reply received");
                self.transcript.push(entry.clone());
                ChatTurn::Replied(entry)
            }
            Err(err) => {
                warn!(chat = ?self.target, error = %err, "Chat request failed");
                let message = match &self.target {
                    ChatTarget::Project { .. } => {
                        self.transcript.pop();
                        let message = err.user_message();
                        self.notifications.error(message.clone());
                        message
                    }
                    ChatTarget::AlienGpt => {
                        let message = server_message(&err)
                            .unwrap_or_else(|| ALIEN_GPT_FALLBACK.to_string());
                        self.transcript.push(ChatEntry::new(ChatRole::Error, message.clone()));
                        message
                    }
                    ChatTarget::Global => {
                        self.transcript.push(ChatEntry::new(ChatRole::Error, GLOBAL_FALLBACK));
                        GLOBAL_FALLBACK.to_string()
                    }
                };
                ChatTurn::Failed { message }
            }
        }
    }

    /// Assistant status for a project chat. `None` for other targets.
    pub async fn status(&self) -> ClientResult<Option<AiStatus>> {
        let ChatTarget::Project { id, .. } = &self.target else {
            return Ok(None);
        };
        let result = self.rest.project_ai_status(id).await;
        self.session.check(result).await.map(Some)
    }

    /// Set up the project assistant. Requires an editing role.
    pub async fn initialize(&self) -> ClientResult<()> {
        let ChatTarget::Project { id, .. } = &self.target else {
            return Ok(());
        };
        ensure_can_mutate(self.session.current_user().as_ref())?;
        let result = self.rest.initialize_project_ai(id).await;
        self.report(result.map(|_| "AI assistants initialized successfully!".to_string()))
            .await
    }

    /// Re-index the project knowledge base.
    pub async fn sync_knowledge(&self) -> ClientResult<()> {
        let ChatTarget::Project { id, .. } = &self.target else {
            return Ok(());
        };
        ensure_can_mutate(self.session.current_user().as_ref())?;
        let result = self.rest.sync_project_ai(id).await;
        let result = result.map(|reply| {
            reply
                .message
                .unwrap_or_else(|| "Knowledge base synced".to_string())
        });
        self.report(result).await
    }

    async fn report(&self, result: Result<String, ApiClientError>) -> ClientResult<()> {
        match self.session.check(result).await {
            Ok(message) => {
                self.notifications.success(message);
                Ok(())
            }
            Err(err) => {
                self.notifications.error(err.user_message());
                Err(err)
            }
        }
    }
}

fn server_message(err: &ClientError) -> Option<String> {
    match err {
        ClientError::Api(
            ApiClientError::Status { message, .. }
            | ApiClientError::Forbidden { message }
            | ApiClientError::Unauthorized { message },
        ) => Some(message.clone()),
        _ => None,
    }
}
