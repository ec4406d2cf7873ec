//! Completion Backend Traits
//!
//! One HTTP attempt against a remote completion service. Retrying,
//! timeouts and classification live in
//! [`CompletionClient`](crate::client::CompletionClient); a backend only
//! reports what happened on a single try.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::state::{History, HistoryEntry};

/// Outcome of a failed attempt
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Non-2xx HTTP status
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Connection, TLS or request-building failure
    #[error("transport error: {0}")]
    Transport(String),

    /// 2xx with no reply text
    #[error("empty response")]
    EmptyResponse,

    /// 2xx with a body that is not the expected JSON
    #[error("could not decode response: {0}")]
    Decode(String),

    /// No answer within the per-attempt deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    /// 401/403: the credential itself was refused
    #[must_use]
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }

    /// 429: the service asked us to slow down
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status { status: 429, .. })
    }

    /// Timeout or transport failure: the service was never reached
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// HTTP status, if the failure carried one
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// What to send on one attempt
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Conversation, oldest first (ends with the user's message)
    pub messages: Vec<HistoryEntry>,
    /// System prompt override (backend default when `None`)
    pub system: Option<String>,
}

impl CompletionRequest {
    /// Request carrying a snapshot of `history`
    #[must_use]
    pub fn from_history(history: &History) -> Self {
        Self {
            messages: history.iter().cloned().collect(),
            system: None,
        }
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Remote completion backend
///
/// Implement this to talk to a different provider, or to script responses
/// in tests.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Perform exactly one attempt
    async fn send(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}
