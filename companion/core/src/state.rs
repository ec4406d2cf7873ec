//! Conversation State
//!
//! The one record in Zoe with a lifecycle longer than a single turn: the
//! phase, the captured name, the turn and discovery counters, and the
//! bounded history that is sent to the completion API as context.
//!
//! # Ownership
//!
//! The [`Responder`](crate::responder::Responder) owns the state by value.
//! Surfaces only ever see `&ConversationState` or a [`StateSnapshot`], so
//! counters and phase can only move through the methods below, which keep
//! the invariants:
//!
//! - phase never moves backwards, except `Awakening -> Chat`
//! - `turn_count` and `discovery_count` never decrease
//! - `history.len() <= history.capacity()` after every mutation

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of history entries kept for API context
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Coarse conversation mode
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the user's name
    #[default]
    Intro,
    /// Regular conversation, rules and API fallback
    Chat,
    /// Scripted transition offering choices
    Awakening,
    /// The game on the other side
    Game,
}

impl Phase {
    /// Stable lowercase name (used in logs and the HUD)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Chat => "chat",
            Self::Awakening => "awakening",
            Self::Game => "game",
        }
    }

    /// Whether `self -> next` is a sanctioned transition
    #[must_use]
    pub fn can_transition_to(self, next: Phase) -> bool {
        next >= self || (self == Self::Awakening && next == Self::Chat)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected phase change
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal phase transition {from} -> {to}")]
pub struct TransitionError {
    /// Phase before the attempted change
    pub from: Phase,
    /// Requested phase
    pub to: Phase,
}

/// Who wrote a history entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing
    User,
    /// Zoe (remote completion replies)
    Assistant,
}

impl Role {
    /// Wire name used by the completion API
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One (role, text) pair of conversation history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Author
    pub role: Role,
    /// Message text
    pub content: String,
}

impl HistoryEntry {
    /// Create an entry
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Sliding window of conversation history
///
/// Oldest entries are evicted first once `capacity` is exceeded.
/// A capacity of 0 means unlimited. Serialized as a plain JSON array; the
/// capacity is runtime configuration and is re-applied after loading.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    #[serde(skip)]
    capacity: usize,
}

impl History {
    /// Create an empty history bounded to `capacity` entries
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest ones if over capacity
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push_back(HistoryEntry::new(role, content));
        self.prune();
    }

    /// Change the bound and prune immediately
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.prune();
    }

    /// Configured bound (0 = unlimited)
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Drop every entry (keeps the capacity)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn prune(&mut self) {
        if self.capacity == 0 || self.entries.len() <= self.capacity {
            return;
        }

        let to_remove = self.entries.len() - self.capacity;
        self.entries.drain(..to_remove);

        tracing::debug!(
            removed = to_remove,
            remaining = self.entries.len(),
            "Pruned conversation history"
        );
    }
}

/// Read-only view for HUD rendering
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Captured name (empty before intro completes)
    pub user_name: String,
    /// Messages received
    pub turn_count: u32,
    /// Fragments revealed
    pub discovery_count: u32,
    /// Eveil level
    pub level: u32,
}

/// The persisted conversation record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    phase: Phase,
    user_name: String,
    turn_count: u32,
    discovery_count: u32,
    level: u32,
    discoveries: Vec<String>,
    history: History,
    /// Session-only: a restart before the awakening played must allow it again
    #[serde(skip)]
    awakening_scheduled: bool,
}

impl ConversationState {
    /// Fresh state with the given history bound
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            history: History::with_capacity(max_history),
            ..Self::default()
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Captured name
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Messages received so far
    #[must_use]
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// Fragments revealed so far
    #[must_use]
    pub fn discovery_count(&self) -> u32 {
        self.discovery_count
    }

    /// Eveil level
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Revealed fragment texts, oldest first
    #[must_use]
    pub fn discoveries(&self) -> &[String] {
        &self.discoveries
    }

    /// Conversation history sent to the API
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Mutable history (its own API keeps the bound)
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Whether the awakening has already been scheduled in this session
    #[must_use]
    pub fn awakening_scheduled(&self) -> bool {
        self.awakening_scheduled
    }

    /// HUD view
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase,
            user_name: self.user_name.clone(),
            turn_count: self.turn_count,
            discovery_count: self.discovery_count,
            level: self.level,
        }
    }

    /// Count one user message
    pub fn record_turn(&mut self) -> u32 {
        self.turn_count = self.turn_count.saturating_add(1);
        self.turn_count
    }

    /// Capture the user's name from their first message and enter `Chat`
    ///
    /// Returns `false` (and changes nothing) outside the intro phase; the
    /// name is immutable once captured.
    pub fn capture_name(&mut self, input: &str) -> bool {
        if self.phase != Phase::Intro {
            return false;
        }
        self.user_name = sanitize_name(input);
        self.phase = Phase::Chat;
        true
    }

    /// Move to another phase if the transition is sanctioned
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] for backward moves other than
    /// `Awakening -> Chat`.
    pub fn transition(&mut self, next: Phase) -> Result<(), TransitionError> {
        if !self.phase.can_transition_to(next) {
            return Err(TransitionError {
                from: self.phase,
                to: next,
            });
        }
        if self.phase != next {
            tracing::info!(from = %self.phase, to = %next, "Phase transition");
        }
        self.phase = next;
        Ok(())
    }

    /// Record a revealed fragment, returning the new count
    pub fn record_discovery(&mut self, text: impl Into<String>) -> u32 {
        self.discoveries.push(text.into());
        self.discovery_count = self.discovery_count.saturating_add(1);
        self.discovery_count
    }

    /// Raise the level to at least `level` (never lowers it)
    pub fn raise_level_to(&mut self, level: u32) {
        self.level = self.level.max(level);
    }

    /// Increment the level, returning the new value
    pub fn bump_level(&mut self) -> u32 {
        self.level = self.level.saturating_add(1);
        self.level
    }

    /// Mark the awakening as scheduled; `false` if it already was
    pub fn mark_awakening_scheduled(&mut self) -> bool {
        if self.awakening_scheduled {
            return false;
        }
        self.awakening_scheduled = true;
        true
    }
}

/// First whitespace-delimited token, letters only
#[must_use]
pub fn sanitize_name(input: &str) -> String {
    input
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect()
}
