//! Completion Client
//!
//! Bounded retry loop around a [`CompletionBackend`]. Every attempt runs
//! under `tokio::time::timeout`, so a stalled request is cancelled by
//! dropping its future.
//!
//! # Classification
//!
//! | Outcome | Action |
//! |---|---|
//! | 2xx with text | push reply into history, return it |
//! | 2xx without text | retry after `backoff * attempt` |
//! | 401 / 403 | stop, mark the credential rejected |
//! | 429 | retry after `backoff * attempt * rate_limit_multiplier` |
//! | timeout, transport, other status | retry after `backoff * attempt` |
//!
//! Attempts are numbered from 1. There is no wait after the last attempt.
//! The client never returns an error: every failure path ends in `None`
//! plus a trace. When every attempt of a call failed without reaching the
//! service, [`CompletionClient::unreachable`] reports it until the next
//! call.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, CompletionBackend, CompletionRequest};
use crate::state::{History, Role};

/// Retry behaviour for remote completions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Deadline for a single attempt
    pub timeout: Duration,
    /// Base delay, scaled linearly by the attempt number
    pub backoff: Duration,
    /// Extra factor applied on 429
    pub rate_limit_multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            backoff: Duration::from_secs(1),
            rate_limit_multiplier: 2,
        }
    }
}

impl RetryConfig {
    /// Delay after failed attempt `attempt` (1-based)
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    /// Delay after a 429 on attempt `attempt` (1-based)
    #[must_use]
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        self.backoff_for_attempt(attempt)
            .saturating_mul(self.rate_limit_multiplier)
    }

    /// Upper bound on one `complete` call
    ///
    /// Every attempt times out and every wait is rate-limited.
    #[must_use]
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let waits: Duration = (1..attempts).map(|a| self.rate_limit_backoff(a)).sum();
        self.timeout.saturating_mul(attempts) + waits
    }
}

/// Retrying client over a shared backend
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    retry: RetryConfig,
    credential_rejected: bool,
    unreachable: bool,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .field("credential_rejected", &self.credential_rejected)
            .field("unreachable", &self.unreachable)
            .finish()
    }
}

impl CompletionClient {
    /// Create a client
    pub fn new(backend: Arc<dyn CompletionBackend>, retry: RetryConfig) -> Self {
        Self {
            backend,
            retry,
            credential_rejected: false,
            unreachable: false,
        }
    }

    /// Retry settings
    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Backend name
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether the service refused the credential (401/403)
    #[must_use]
    pub fn credential_rejected(&self) -> bool {
        self.credential_rejected
    }

    /// Whether the last call failed on timeouts and transport errors only
    #[must_use]
    pub fn unreachable(&self) -> bool {
        self.unreachable
    }

    /// Ask for a reply to `message`, with `history` as context
    ///
    /// The user message is pushed into `history` first; on success the
    /// reply is pushed too. Returns `None` when the credential was
    /// refused (see [`credential_rejected`](Self::credential_rejected)) or
    /// when every attempt failed.
    pub async fn complete(&mut self, message: &str, history: &mut History) -> Option<String> {
        if self.credential_rejected {
            tracing::debug!("Skipping completion, credential was rejected");
            return None;
        }

        history.push(Role::User, message);
        let request = CompletionRequest::from_history(history);
        let attempts = self.retry.max_attempts.max(1);
        let mut unreachable = true;
        self.unreachable = false;

        for attempt in 1..=attempts {
            let result =
                match tokio::time::timeout(self.retry.timeout, self.backend.send(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::Timeout(self.retry.timeout)),
                };

            let err = match result {
                Ok(reply) => {
                    tracing::info!(
                        backend = self.backend.name(),
                        attempt,
                        chars = reply.len(),
                        "Completion received"
                    );
                    history.push(Role::Assistant, reply.clone());
                    return Some(reply);
                }
                Err(err) => err,
            };

            if err.is_credential_rejection() {
                tracing::error!(
                    backend = self.backend.name(),
                    status = err.status(),
                    "Credential rejected, not retrying"
                );
                self.credential_rejected = true;
                return None;
            }
            unreachable &= err.is_connectivity();

            tracing::warn!(
                backend = self.backend.name(),
                attempt,
                max_attempts = attempts,
                error = %err,
                "Completion attempt failed"
            );

            if attempt == attempts {
                break;
            }

            let backoff = if err.is_rate_limited() {
                self.retry.rate_limit_backoff(attempt)
            } else {
                self.retry.backoff_for_attempt(attempt)
            };
            tracing::debug!(attempt, backoff_ms = backoff.as_millis(), "Retry backoff");
            tokio::time::sleep(backoff).await;
        }

        tracing::error!(
            backend = self.backend.name(),
            attempts,
            unreachable,
            "Completion attempts exhausted"
        );
        self.unreachable = unreachable;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Replays queued outcomes; an empty queue means "never answers"
    struct ScriptedBackend {
        outcomes: Mutex<VecDeque<Result<String, BackendError>>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<Result<String, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.outcomes.lock().unwrap().pop_front();
            match next {
                Some(outcome) => outcome,
                None => std::future::pending().await,
            }
        }
    }

    fn status(code: u16) -> Result<String, BackendError> {
        Err(BackendError::Status {
            status: code,
            body: String::new(),
        })
    }

    #[test]
    fn test_backoff_schedule() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_for_attempt(1), Duration::from_secs(1));
        assert_eq!(retry.backoff_for_attempt(3), Duration::from_secs(3));
        assert_eq!(retry.rate_limit_backoff(2), Duration::from_secs(4));
        // 3 * 30s + (2s + 4s)
        assert_eq!(retry.worst_case_duration(), Duration::from_secs(96));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_updates_history() {
        let backend = ScriptedBackend::new(vec![Ok("hmm. raconte.".into())]);
        let mut client = CompletionClient::new(backend.clone(), RetryConfig::default());
        let mut history = History::with_capacity(20);

        let reply = client.complete("je pense a la mer", &mut history).await;

        assert_eq!(reply.as_deref(), Some("hmm. raconte."));
        assert_eq!(backend.calls(), 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_timeout_makes_every_attempt() {
        let backend = ScriptedBackend::new(vec![]);
        let retry = RetryConfig::default();
        let mut client = CompletionClient::new(backend.clone(), retry);
        let mut history = History::with_capacity(20);

        let start = tokio::time::Instant::now();
        let reply = client.complete("allo?", &mut history).await;
        let elapsed = start.elapsed();

        assert!(reply.is_none());
        assert_eq!(backend.calls(), 3);
        // 3 timeouts + 1s + 2s of backoff, nothing after the last attempt
        assert_eq!(elapsed, Duration::from_secs(93));
        assert!(elapsed <= retry.worst_case_duration());
        // Only the user message was recorded
        assert_eq!(history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_is_terminal() {
        let backend = ScriptedBackend::new(vec![status(401), Ok("never".into())]);
        let mut client = CompletionClient::new(backend.clone(), RetryConfig::default());
        let mut history = History::with_capacity(20);

        assert!(client.complete("salut", &mut history).await.is_none());
        assert_eq!(backend.calls(), 1);
        assert!(client.credential_rejected());

        // Stays disabled
        assert!(client.complete("encore", &mut history).await.is_none());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_longer_and_counts() {
        let limited = ScriptedBackend::new(vec![status(429), Ok("ok".into())]);
        let mut client = CompletionClient::new(limited.clone(), RetryConfig::default());
        let mut history = History::with_capacity(20);
        let start = tokio::time::Instant::now();
        assert!(client.complete("a", &mut history).await.is_some());
        let limited_elapsed = start.elapsed();

        let failing = ScriptedBackend::new(vec![status(500), Ok("ok".into())]);
        let mut client = CompletionClient::new(failing.clone(), RetryConfig::default());
        let start = tokio::time::Instant::now();
        assert!(client.complete("a", &mut history).await.is_some());
        let failing_elapsed = start.elapsed();

        assert_eq!(limited_elapsed, Duration::from_secs(2));
        assert_eq!(failing_elapsed, Duration::from_secs(1));

        let always_limited = ScriptedBackend::new(vec![status(429), status(429), status(429)]);
        let mut client = CompletionClient::new(always_limited.clone(), RetryConfig::default());
        assert!(client.complete("a", &mut history).await.is_none());
        assert_eq!(always_limited.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response_is_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::EmptyResponse),
            Err(BackendError::Transport("reset".into())),
            Ok("la.".into()),
        ]);
        let mut client = CompletionClient::new(backend.clone(), RetryConfig::default());
        let mut history = History::with_capacity(20);

        assert_eq!(
            client.complete("tu es la?", &mut history).await.as_deref(),
            Some("la.")
        );
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_only_without_any_response() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::Transport("dns".into())),
            Err(BackendError::Timeout(Duration::from_secs(30))),
            Err(BackendError::Transport("refused".into())),
            Err(BackendError::Transport("refused".into())),
            status(503),
            Err(BackendError::Transport("refused".into())),
            Ok("la.".into()),
        ]);
        let mut client = CompletionClient::new(backend.clone(), RetryConfig::default());
        let mut history = History::with_capacity(20);
        assert!(!client.unreachable());

        assert!(client.complete("allo?", &mut history).await.is_none());
        assert!(client.unreachable());

        // One real status means the service answered
        assert!(client.complete("allo?", &mut history).await.is_none());
        assert!(!client.unreachable());

        assert!(client.complete("allo?", &mut history).await.is_some());
        assert!(!client.unreachable());
    }
}
