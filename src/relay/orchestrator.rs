//! Turn orchestrator — reconciles preferences, composes first-turn
//! instructions, and delegates the turn to the hosted agent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::agent::{AgentClient, MessageOrder, MessageRole, ThreadMessage};
use crate::error::{AgentError, RelayError};
use crate::preferences::{
    OnboardingData, PreferenceStore, PreferencesRecord, PreferencesUpdate, Settings, compose,
    with_context_block,
};

/// Reply text used when a turn succeeds but the agent wrote nothing.
pub const NO_MESSAGE: &str = "No message";

/// One inbound chat turn.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    pub input: String,
    pub thread_id: Option<String>,
    pub settings: Option<Settings>,
    pub onboarding_data: Option<OnboardingData>,
}

impl ChatTurn {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_onboarding(mut self, onboarding: OnboardingData) -> Self {
        self.onboarding_data = Some(onboarding);
        self
    }

    fn preferences_update(&self) -> PreferencesUpdate {
        PreferencesUpdate::new(self.settings.clone(), self.onboarding_data.clone())
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub response: String,
    pub thread_id: String,
    /// Whether composed instructions were prefixed onto the outbound text.
    pub instructions_injected: bool,
}

/// Drives chat turns against the agent and keeps preferences in sync.
pub struct TurnOrchestrator {
    agent: Arc<dyn AgentClient>,
    store: Arc<dyn PreferenceStore>,
    turn_timeout: Duration,
}

impl TurnOrchestrator {
    pub fn new(
        agent: Arc<dyn AgentClient>,
        store: Arc<dyn PreferenceStore>,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            agent,
            store,
            turn_timeout,
        }
    }

    /// Handle one chat turn end to end.
    ///
    /// All agent work is bounded by the turn timeout; expiry surfaces as
    /// `AgentError::Timeout`.
    pub async fn handle_turn(&self, mut turn: ChatTurn) -> Result<TurnReply, RelayError> {
        if turn.input.trim().is_empty() {
            return Err(RelayError::InvalidRequest(
                "input must be a non-empty string".to_string(),
            ));
        }
        turn.thread_id = turn
            .thread_id
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(thread_id) = &turn.thread_id {
            if !is_valid_thread_id(thread_id) {
                return Err(RelayError::InvalidRequest(
                    "threadID may only contain letters, digits, '_' and '-'".to_string(),
                ));
            }
        }

        let started = Instant::now();
        // Expiry drops `run_turn`; the agent client cancels any run it abandons.
        let result = match tokio::time::timeout(self.turn_timeout, self.run_turn(turn)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.turn_timeout).into()),
        };

        match &result {
            Ok(reply) => info!(
                thread_id = %reply.thread_id,
                injected = reply.instructions_injected,
                reply_chars = reply.response.chars().count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Chat turn completed"
            ),
            Err(e) => warn!(
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Chat turn failed"
            ),
        }
        result
    }

    async fn run_turn(&self, turn: ChatTurn) -> Result<TurnReply, RelayError> {
        let update = turn.preferences_update();

        let thread_id = match turn.thread_id {
            Some(id) => id,
            None => {
                let id = self.agent.create_thread().await?;
                debug!(thread_id = %id, agent = self.agent.name(), "Started new thread");
                id
            }
        };

        if !update.is_empty() {
            self.store.upsert(&thread_id, update).await;
        }

        let stored = self.store.get(&thread_id).await;
        let settings = turn.settings.unwrap_or(stored.settings);
        let onboarding = turn.onboarding_data.unwrap_or(stored.onboarding_data);

        let first_turn = self
            .agent
            .list_messages(&thread_id, MessageOrder::NewestFirst, Some(1))
            .await?
            .is_empty();

        let outbound = if first_turn {
            with_context_block(&compose(&settings, &onboarding), &turn.input)
        } else {
            turn.input
        };

        self.agent
            .add_message(&thread_id, MessageRole::User, &outbound)
            .await?;
        self.agent.run_to_completion(&thread_id).await?;

        let messages = self
            .agent
            .list_messages(&thread_id, MessageOrder::NewestFirst, None)
            .await?;
        let response = latest_assistant_reply(&messages)
            .map(str::to_string)
            .unwrap_or_else(|| {
                debug!(thread_id = %thread_id, "No assistant reply in thread");
                NO_MESSAGE.to_string()
            });

        Ok(TurnReply {
            response,
            thread_id,
            instructions_injected: first_turn,
        })
    }

    /// Overwrite both preference fields for a thread.
    ///
    /// Missing onboarding data is stored as an empty map.
    pub async fn replace_preferences(
        &self,
        thread_id: &str,
        settings: Settings,
        onboarding_data: Option<OnboardingData>,
    ) -> Result<PreferencesRecord, RelayError> {
        let thread_id = thread_id.trim();
        if thread_id.is_empty() {
            return Err(RelayError::InvalidRequest(
                "threadID must be a non-empty string".to_string(),
            ));
        }
        let update = PreferencesUpdate::new(
            Some(settings),
            Some(onboarding_data.unwrap_or_default()),
        );
        let record = self.store.upsert(thread_id, update).await;
        info!(thread_id, "Preferences replaced");
        Ok(record)
    }

    /// Stored preferences for a thread, or the default record.
    pub async fn preferences(&self, thread_id: &str) -> PreferencesRecord {
        self.store.get(thread_id.trim()).await
    }
}

/// Agent thread ids are opaque but always drawn from `[A-Za-z0-9_-]`.
fn is_valid_thread_id(thread_id: &str) -> bool {
    thread_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// First assistant-authored message with text, in the given (newest-first) order.
fn latest_assistant_reply(messages: &[ThreadMessage]) -> Option<&str> {
    messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .find_map(|m| m.reply_text())
}
