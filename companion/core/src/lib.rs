//! Zoe Core - Headless conversation pipeline for Zoe
//!
//! Zoe is a small conversational companion. Local keyword rules answer most
//! messages; anything they miss goes to a remote completion API, and when
//! that fails a canned line keeps the conversation alive. Underneath, a
//! slowly surfacing story ("fragments") moves the conversation through
//! intro, chat, awakening and a game mode.
//!
//! This crate knows nothing about terminals. A surface feeds text in and
//! plays the returned [`Script`] at its own pace.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Surface (TUI)                         │
//! │   input ──► InputGate ──► Responder::handle ──► Script ──►    │
//! │                                                 play(pacer)   │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┼────────────────────────────────┐
//! │                          ZOE CORE                             │
//! │  ┌───────────────────────────┴─────────────────────────────┐  │
//! │  │                       Responder                         │  │
//! │  │  ┌─────────┐  ┌──────────────┐  ┌────────────────────┐  │  │
//! │  │  │ Matcher │  │ Conversation │  │  CompletionClient  │  │  │
//! │  │  │ (rules) │  │    State     │  │ (retry, backoff)   │  │  │
//! │  │  └─────────┘  └──────┬───────┘  └─────────┬──────────┘  │  │
//! │  └──────────────────────┼────────────────────┼─────────────┘  │
//! │                  StateStore            CompletionBackend      │
//! │               (JSON file, memory)        (Anthropic API)      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: completion backend trait and the Anthropic messages client
//! - [`client`]: retry and backoff around a backend, history bookkeeping
//! - [`config`]: TOML, environment and CLI configuration
//! - [`content`]: canned lines (defaults, fragments, thoughts, mentors)
//! - [`gate`]: one turn in flight at a time
//! - [`integrity`]: periodic self-check of the conversation record
//! - [`matcher`]: compiled rule table and input normalization
//! - [`mind`]: idle thoughts and mentor quotes
//! - [`responder`]: the conversation pipeline
//! - [`rules`]: the keyword rule table and reply generators
//! - [`script`]: timed reply scripts and playback
//! - [`state`]: phases, counters and bounded history
//! - [`store`]: persisted record and stored credential
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod client;
pub mod config;
pub mod content;
pub mod gate;
pub mod integrity;
pub mod matcher;
pub mod mind;
pub mod responder;
pub mod rules;
pub mod script;
pub mod state;
pub mod store;

// Re-exports for convenience
pub use backend::{
    AnthropicBackend, AnthropicConfig, BackendError, CompletionBackend, CompletionRequest,
};
pub use client::{CompletionClient, RetryConfig};
pub use gate::{InputGate, TurnGuard};
pub use integrity::{IntegrityMonitor, IntegrityReport};
pub use matcher::{normalize, Matcher, MatcherError};
pub use mind::{Mind, MindConfig};
pub use responder::{
    Choice, ChoiceAction, FollowUp, Reply, Responder, ResponderSettings, TuningConfig,
};
pub use rules::{RulePriority, RuleSpec, STANDARD_RULES};
pub use script::{play, Effect, InstantPacer, Line, LineKind, Pacer, Script, Step};
pub use state::{ConversationState, History, HistoryEntry, Phase, Role, StateSnapshot};
pub use store::{CredentialStore, JsonFileStore, MemoryStore, StateStore, StoreError};

// Config exports
pub use config::{
    default_config_path, default_data_dir, load_config, load_config_from_path, ConfigError,
    ConfigOverrides, ConfigSource, ZoeConfig,
};
