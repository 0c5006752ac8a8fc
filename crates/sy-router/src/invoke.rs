//! Backend invocation contract.
//!
//! The router never talks to a backend directly; everything goes through
//! [`BackendInvoker`]. The bundled [`HttpInvoker`] speaks the
//! OpenAI-compatible chat completions protocol that hosted and local
//! inference servers share, and [`MockInvoker`] scripts responses for
//! tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use sy_core::{estimate_cost, BackendDescriptor};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from a backend invocation. The router propagates these unchanged;
/// there is no internal retry.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// An HTTP-level error (connection failure, DNS, TLS, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend returned a non-success status with a message.
    #[error("backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the backend response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the request.
    #[error("cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for InvokeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InvokeError::Timeout
        } else {
            InvokeError::Http(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Core data types
// ---------------------------------------------------------------------------

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in an already-assembled conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The result of one backend call, attributed for cost accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub backend_id: String,
    pub provider: String,
}

// ---------------------------------------------------------------------------
// BackendInvoker trait
// ---------------------------------------------------------------------------

/// Async contract for calling one backend.
///
/// Implementations must observe `cancel` and return
/// [`InvokeError::Cancelled`] promptly instead of completing the call.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke(
        &self,
        messages: &[Message],
        backend: &BackendDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Invocation, InvokeError>;
}

// ---------------------------------------------------------------------------
// HttpInvoker — OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

/// Invoker for servers exposing an OpenAI-compatible
/// `/v1/chat/completions` endpoint (hosted gateways, vllm, llama.cpp,
/// Ollama, TGI). Authentication is optional; many local servers run
/// without keys.
pub struct HttpInvoker {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl HttpInvoker {
    /// `base_url` is the server address (e.g. `"http://localhost:8000"`).
    /// `api_key` is optional; pass `None` for servers without auth.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let key = api_key.filter(|k| !k.is_empty() && k != "none");
        Self {
            client: reqwest::Client::new(),
            api_key: key,
            base_url: base_url.into(),
        }
    }

    /// Build the JSON request body. System messages go inline in the
    /// messages array, matching the OpenAI wire format.
    pub fn build_request_body(messages: &[Message], backend: &BackendDescriptor) -> serde_json::Value {
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role.to_string(),
                    "content": msg.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": backend.id,
            "messages": api_messages,
        })
    }
}

/// Deserialize helpers for OpenAI-compatible responses.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

#[async_trait]
impl BackendInvoker for HttpInvoker {
    async fn invoke(
        &self,
        messages: &[Message],
        backend: &BackendDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Invocation, InvokeError> {
        let body = Self::build_request_body(messages, backend);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = tokio::select! {
            _ = cancel.cancelled() => return Err(InvokeError::Cancelled),
            resp = req.send() => resp?,
        };

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(InvokeError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ChatResponse = tokio::select! {
            _ = cancel.cancelled() => return Err(InvokeError::Cancelled),
            body = resp.json() => body.map_err(|e| InvokeError::Parse(e.to_string()))?,
        };

        let choice = api_resp
            .choices
            .first()
            .ok_or_else(|| InvokeError::Parse("no choices in response".into()))?;

        let usage = api_resp.usage.as_ref();
        let input_tokens = usage.and_then(|u| u.prompt_tokens).unwrap_or(0);
        let output_tokens = usage.and_then(|u| u.completion_tokens).unwrap_or(0);

        Ok(Invocation {
            content: choice.message.content.clone().unwrap_or_default(),
            input_tokens,
            output_tokens,
            cost: estimate_cost(input_tokens, output_tokens, backend),
            backend_id: backend.id.clone(),
            provider: backend.provider.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockInvoker
// ---------------------------------------------------------------------------

/// A scripted invoker for testing.
///
/// Each call pops the next reply from the queue; an empty queue yields a
/// default reply. Every call is recorded so tests can assert on call
/// counts and the backends used.
pub struct MockInvoker {
    replies: Arc<Mutex<VecDeque<Result<String, InvokeError>>>>,
    calls: Arc<Mutex<Vec<(String, Vec<Message>)>>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a reply with the given content.
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(content.into()));
        self
    }

    /// Queue an error.
    pub fn with_error(self, error: InvokeError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Backend ids and messages of every call made so far.
    pub fn calls(&self) -> Vec<(String, Vec<Message>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendInvoker for MockInvoker {
    async fn invoke(
        &self,
        messages: &[Message],
        backend: &BackendDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Invocation, InvokeError> {
        if cancel.is_cancelled() {
            return Err(InvokeError::Cancelled);
        }

        self.calls
            .lock()
            .unwrap()
            .push((backend.id.clone(), messages.to_vec()));

        let content = {
            let mut queue = self.replies.lock().unwrap();
            match queue.pop_front() {
                Some(Ok(content)) => content,
                Some(Err(err)) => return Err(err),
                None => "mock reply".to_string(),
            }
        };

        let (input_tokens, output_tokens) = (10, 5);
        Ok(Invocation {
            content,
            input_tokens,
            output_tokens,
            cost: estimate_cost(input_tokens, output_tokens, backend),
            backend_id: backend.id.clone(),
            provider: backend.provider.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
