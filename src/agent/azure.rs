//! Azure AI Agents client — threads, messages and runs over REST.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{AgentClient, MessageOrder, MessageRole, ThreadMessage};
use crate::config::{AgentConfig, AgentCredential};
use crate::error::AgentError;

/// Longest slice of an upstream error body written to the log.
const MAX_ERROR_BODY: usize = 512;

/// Run status that waits on tool outputs the relay never submits.
const REQUIRES_ACTION: &str = "requires_action";

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRun<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: String,
    #[serde(default)]
    last_error: Option<RunLastError>,
}

#[derive(Debug, Deserialize)]
struct RunLastError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    id: String,
    role: MessageRole,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

impl From<MessageObject> for ThreadMessage {
    fn from(msg: MessageObject) -> Self {
        let text = msg
            .content
            .into_iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.value),
                MessageContent::Other => None,
            })
            .collect();
        ThreadMessage::new(msg.id, msg.role, text)
    }
}

/// Where a run stands after a status read.
#[derive(Debug, PartialEq, Eq)]
enum RunState {
    Pending,
    Completed,
    Ended,
}

fn classify_run_status(status: &str) -> RunState {
    match status {
        "queued" | "in_progress" | "cancelling" => RunState::Pending,
        "completed" => RunState::Completed,
        _ => RunState::Ended,
    }
}

// ── Client ──────────────────────────────────────────────────────────────

/// REST client for a single Azure AI agent.
pub struct AzureAgentClient {
    config: AgentConfig,
    base: Url,
    client: reqwest::Client,
}

impl AzureAgentClient {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let build_error = |reason: String| AgentError::RequestFailed {
            operation: "build_client".to_string(),
            reason,
        };

        let base = Url::parse(&config.endpoint)
            .map_err(|e| build_error(format!("invalid endpoint {}: {e}", config.endpoint)))?;
        if base.cannot_be_a_base() {
            return Err(build_error(format!(
                "endpoint {} cannot carry a path",
                config.endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| build_error(e.to_string()))?;
        Ok(Self {
            config,
            base,
            client,
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }

    /// Endpoint URL with `segments` appended, each percent-encoded as a
    /// single path segment.
    fn url(&self, operation: &str, segments: &[&str]) -> Result<Url, AgentError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(AgentError::RequestFailed {
                operation: operation.to_string(),
                reason: format!("invalid path segment {bad:?}"),
            });
        }

        let mut url = self.base.clone();
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(()) => {
                return Err(AgentError::RequestFailed {
                    operation: operation.to_string(),
                    reason: "endpoint cannot carry a path".to_string(),
                });
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        operation: &str,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, AgentError> {
        let builder = self
            .client
            .request(method, self.url(operation, segments)?)
            .query(&[("api-version", self.config.api_version.as_str())]);

        Ok(match &self.config.credential {
            AgentCredential::Bearer(token) => builder.bearer_auth(token.expose_secret()),
            AgentCredential::ApiKey(key) => builder.header("api-key", key.expose_secret()),
            AgentCredential::None => builder,
        })
    }

    /// Send a request and decode a JSON body, mapping failures to `AgentError`.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<T, AgentError> {
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(self.config.request_timeout)
            } else {
                AgentError::RequestFailed {
                    operation: operation.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(self.config.request_timeout)
            } else {
                AgentError::InvalidResponse {
                    operation: operation.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !status.is_success() {
            warn!(
                operation,
                status = %status,
                body = truncate(&body, MAX_ERROR_BODY),
                "Agent service returned an error status"
            );
            return Err(status_error(operation, status));
        }

        serde_json::from_str(&body).map_err(|e| AgentError::InvalidResponse {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, AgentError> {
        let request = self.request(
            "get_run",
            Method::GET,
            &["threads", thread_id, "runs", run_id],
        )?;
        self.send("get_run", request).await
    }

    fn cancel_request(&self, thread_id: &str, run_id: &str) -> Result<RequestBuilder, AgentError> {
        self.request(
            "cancel_run",
            Method::POST,
            &["threads", thread_id, "runs", run_id, "cancel"],
        )
    }

    /// Cancel a run so the thread accepts new messages again.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), AgentError> {
        let request = self.cancel_request(thread_id, run_id)?;
        let _: serde_json::Value = self.send("cancel_run", request).await?;
        info!(thread_id, run_id, "Agent run cancelled");
        Ok(())
    }
}

/// Cancels a run in the background when polling is abandoned before the run
/// settles, e.g. when the caller's turn timeout drops the future.
struct CancelOnDrop {
    request: Option<RequestBuilder>,
    thread_id: String,
    run_id: String,
}

impl CancelOnDrop {
    fn disarm(&mut self) {
        self.request = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let Some(request) = self.request.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let thread_id = std::mem::take(&mut self.thread_id);
        let run_id = std::mem::take(&mut self.run_id);
        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(%thread_id, %run_id, "Abandoned agent run cancelled");
                }
                Ok(resp) => {
                    warn!(%thread_id, %run_id, status = %resp.status(), "Failed to cancel abandoned agent run");
                }
                Err(e) => {
                    warn!(%thread_id, %run_id, error = %e, "Failed to cancel abandoned agent run");
                }
            }
        });
    }
}

fn status_error(operation: &str, status: StatusCode) -> AgentError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::AuthFailed {
            operation: operation.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited {
            operation: operation.to_string(),
        },
        _ => AgentError::RequestFailed {
            operation: operation.to_string(),
            reason: format!("HTTP {status}"),
        },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[async_trait]
impl AgentClient for AzureAgentClient {
    fn name(&self) -> &str {
        "azure-agents"
    }

    async fn create_thread(&self) -> Result<String, AgentError> {
        let request = self
            .request("create_thread", Method::POST, &["threads"])?
            .json(&serde_json::json!({}));
        let thread: ThreadObject = self.send("create_thread", request).await?;
        info!(thread_id = %thread.id, "Agent thread created");
        Ok(thread.id)
    }

    async fn add_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), AgentError> {
        let body = CreateMessage { role, content };
        let request = self
            .request("add_message", Method::POST, &["threads", thread_id, "messages"])?
            .json(&body);
        let _: serde_json::Value = self.send("add_message", request).await?;
        debug!(thread_id, chars = content.chars().count(), "Message added to thread");
        Ok(())
    }

    async fn run_to_completion(&self, thread_id: &str) -> Result<(), AgentError> {
        let body = CreateRun {
            assistant_id: &self.config.agent_id,
        };
        let request = self
            .request("create_run", Method::POST, &["threads", thread_id, "runs"])?
            .json(&body);
        let mut run: RunObject = self.send("create_run", request).await?;
        debug!(thread_id, run_id = %run.id, status = %run.status, "Agent run started");

        let mut guard = CancelOnDrop {
            request: Some(self.cancel_request(thread_id, &run.id)?),
            thread_id: thread_id.to_string(),
            run_id: run.id.clone(),
        };

        loop {
            match classify_run_status(&run.status) {
                RunState::Completed => {
                    guard.disarm();
                    info!(thread_id, run_id = %run.id, "Agent run completed");
                    return Ok(());
                }
                RunState::Ended => {
                    guard.disarm();
                    if run.status == REQUIRES_ACTION {
                        if let Err(e) = self.cancel_run(thread_id, &run.id).await {
                            warn!(thread_id, run_id = %run.id, error = %e, "Failed to cancel run awaiting tool outputs");
                        }
                    }
                    let reason = run
                        .last_error
                        .as_ref()
                        .map(|e| match (&e.code, &e.message) {
                            (Some(code), Some(message)) => format!("{code}: {message}"),
                            (None, Some(message)) => message.clone(),
                            (Some(code), None) => code.clone(),
                            (None, None) => "no error detail".to_string(),
                        })
                        .unwrap_or_else(|| "no error detail".to_string());
                    warn!(thread_id, run_id = %run.id, status = %run.status, %reason, "Agent run did not complete");
                    return Err(AgentError::RunFailed {
                        run_id: run.id,
                        status: run.status,
                        reason,
                    });
                }
                RunState::Pending => {
                    tokio::time::sleep(self.config.poll_interval).await;
                    run = self.get_run(thread_id, &run.id).await?;
                }
            }
        }
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: MessageOrder,
        limit: Option<u32>,
    ) -> Result<Vec<ThreadMessage>, AgentError> {
        let mut builder = self
            .request("list_messages", Method::GET, &["threads", thread_id, "messages"])?
            .query(&[("order", order.as_query())]);
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }

        let list: MessageList = self.send("list_messages", builder).await?;
        Ok(list.data.into_iter().map(ThreadMessage::from).collect())
    }
}
