//! Completion Backend Integration
//!
//! Abstracted access to the remote completion service through a common
//! trait, so the retry loop can be exercised against scripted backends.
//!
//! # Usage
//!
//! ```ignore
//! use zoe_core::backend::{AnthropicBackend, AnthropicConfig, CompletionBackend, CompletionRequest};
//!
//! let backend = AnthropicBackend::new("sk-...", AnthropicConfig::default())?;
//! let reply = backend.send(&CompletionRequest::from_history(&history)).await?;
//! ```

mod anthropic;
mod traits;

pub use anthropic::{
    AnthropicBackend, AnthropicConfig, DEFAULT_API_VERSION, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL,
};
pub use traits::{BackendError, CompletionBackend, CompletionRequest};
