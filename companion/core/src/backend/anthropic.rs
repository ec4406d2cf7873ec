//! Anthropic Backend Implementation
//!
//! Messages API client. One call to [`CompletionBackend::send`] is one POST;
//! the per-attempt timeout is applied by the caller, so the HTTP client is
//! built without one.
//!
//! # Wire format
//!
//! ```text
//! POST {endpoint}
//! x-api-key: sk-...
//! anthropic-version: 2023-06-01
//!
//! {"model": "...", "max_tokens": 300, "system": "...",
//!  "messages": [{"role": "user", "content": "..."}]}
//! ```
//!
//! The reply is read from `content[0].text`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::{BackendError, CompletionBackend, CompletionRequest};
use crate::content::SYSTEM_PROMPT;
use crate::state::{HistoryEntry, Role};

/// Default Messages API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default model
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default API version header
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default reply length cap
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Longest error body kept in a [`BackendError::Status`]
const MAX_ERROR_BODY: usize = 200;

/// Request parameters shared by every attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnthropicConfig {
    /// Messages endpoint URL
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// Reply length cap
    pub max_tokens: u32,
    /// `anthropic-version` header value
    pub api_version: String,
    /// System prompt sent with every request
    pub system_prompt: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_version: DEFAULT_API_VERSION.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API backend
#[derive(Clone)]
pub struct AnthropicBackend {
    api_key: String,
    config: AnthropicConfig,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicBackend {
    /// Create a backend for `api_key`
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, config: AnthropicConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self {
            api_key: api_key.into(),
            config,
            http_client,
        })
    }

    /// Request parameters
    #[must_use]
    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let body = MessagesBody {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: request
                .system
                .as_deref()
                .unwrap_or(&self.config.system_prompt),
            messages: wire_messages(&request.messages),
        };

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.text().await?;
        extract_text(&raw)
    }
}

/// Shape history for the Messages API
///
/// Leading assistant entries are dropped so the conversation opens with a
/// user turn, and consecutive entries from the same role are merged.
fn wire_messages(entries: &[HistoryEntry]) -> Vec<WireMessage> {
    let mut out: Vec<WireMessage> = Vec::with_capacity(entries.len());

    for entry in entries
        .iter()
        .skip_while(|e| e.role == Role::Assistant)
    {
        match out.last_mut() {
            Some(last) if last.role == entry.role.as_str() => {
                last.content.push('\n');
                last.content.push_str(&entry.content);
            }
            _ => out.push(WireMessage {
                role: entry.role.as_str(),
                content: entry.content.clone(),
            }),
        }
    }

    out
}

/// Pull `content[0].text` out of a response body
fn extract_text(raw: &str) -> Result<String, BackendError> {
    let parsed: MessagesResponse =
        serde_json::from_str(raw).map_err(|e| BackendError::Decode(e.to_string()))?;

    parsed
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(BackendError::EmptyResponse)
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(role: Role, text: &str) -> HistoryEntry {
        HistoryEntry::new(role, text)
    }

    #[test]
    fn test_default_config() {
        let config = AnthropicConfig::default();
        assert_eq!(config.endpoint, "https://api.anthropic.com/v1/messages");
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.max_tokens, 300);
        assert_eq!(config.api_version, "2023-06-01");
        assert_eq!(config.system_prompt, SYSTEM_PROMPT);
    }

    #[test]
    fn test_wire_messages_skip_leading_assistant() {
        let entries = vec![
            entry(Role::Assistant, "hey."),
            entry(Role::User, "salut"),
            entry(Role::Assistant, "ca va?"),
        ];
        assert_eq!(
            wire_messages(&entries),
            vec![
                WireMessage {
                    role: "user",
                    content: "salut".into()
                },
                WireMessage {
                    role: "assistant",
                    content: "ca va?".into()
                },
            ]
        );
    }

    #[test]
    fn test_wire_messages_merge_same_role() {
        let entries = vec![entry(Role::User, "un"), entry(Role::User, "deux")];
        let wire = wire_messages(&entries);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].content, "un\ndeux");
    }

    #[test]
    fn test_body_shape() {
        let messages = wire_messages(&[entry(Role::User, "salut")]);
        let body = MessagesBody {
            model: "m",
            max_tokens: 300,
            system: "s",
            messages,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "m",
                "max_tokens": 300,
                "system": "s",
                "messages": [{"role": "user", "content": "salut"}]
            })
        );
    }

    #[test]
    fn test_extract_text() {
        let raw = r#"{"content":[{"type":"text","text":"  Hmm. Raconte. "}]}"#;
        assert_eq!(extract_text(raw).unwrap(), "Hmm. Raconte.");
    }

    #[test]
    fn test_extract_text_empty_is_retryable_error() {
        assert_eq!(
            extract_text(r#"{"content":[]}"#),
            Err(BackendError::EmptyResponse)
        );
        assert_eq!(
            extract_text(r#"{"content":[{"type":"text","text":"  "}]}"#),
            Err(BackendError::EmptyResponse)
        );
        assert_eq!(extract_text("{}"), Err(BackendError::EmptyResponse));
    }

    #[test]
    fn test_extract_text_garbage() {
        assert!(matches!(
            extract_text("<html>"),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let mut s = "ééé".to_string();
        truncate_on_char_boundary(&mut s, 3);
        assert_eq!(s, "é");
    }

    #[test]
    fn test_debug_hides_key() {
        let backend = AnthropicBackend::new("sk-secret", AnthropicConfig::default()).unwrap();
        assert!(!format!("{backend:?}").contains("sk-secret"));
        assert_eq!(backend.name(), "Anthropic");
    }
}
