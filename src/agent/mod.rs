//! Hosted agent collaborator.
//!
//! The relay never reasons on its own: every turn is delegated to a remote
//! agent that owns the conversation thread. `AgentClient` is the minimal
//! surface the relay needs; `AzureAgentClient` implements it against the
//! Azure AI Agents REST API.

pub mod azure;

pub use azure::AzureAgentClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Author of a thread message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    #[serde(other)]
    Unknown,
}

/// Sort order for listing thread messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrder {
    NewestFirst,
    OldestFirst,
}

impl MessageOrder {
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::NewestFirst => "desc",
            Self::OldestFirst => "asc",
        }
    }
}

/// A message read back from a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    /// Text segments in the order the agent produced them.
    pub text: Vec<String>,
}

impl ThreadMessage {
    pub fn new(id: impl Into<String>, role: MessageRole, text: Vec<String>) -> Self {
        Self {
            id: id.into(),
            role,
            text,
        }
    }

    /// The displayable reply: the last non-blank text segment.
    pub fn reply_text(&self) -> Option<&str> {
        self.text
            .iter()
            .rev()
            .map(String::as_str)
            .find(|s| !s.trim().is_empty())
    }
}

/// Operations the relay needs from the hosted agent service.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Start a new conversation thread and return its identifier.
    async fn create_thread(&self) -> Result<String, AgentError>;

    /// Append a message to a thread.
    async fn add_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), AgentError>;

    /// Run the agent against a thread and wait until the run finishes.
    async fn run_to_completion(&self, thread_id: &str) -> Result<(), AgentError>;

    /// List messages of a thread in the given order, optionally capped.
    async fn list_messages(
        &self,
        thread_id: &str,
        order: MessageOrder,
        limit: Option<u32>,
    ) -> Result<Vec<ThreadMessage>, AgentError>;
}
