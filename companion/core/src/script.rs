//! Scripts and Pacing
//!
//! A reply is data: an ordered list of [`Step`]s, each carrying the delay
//! that precedes it. The core never sleeps while building a reply; a
//! surface plays the script through a [`Pacer`], which decides what a
//! delay means (a real tokio sleep in the terminal, nothing in tests).
//!
//! # Example
//!
//! ```
//! use zoe_core::script::{LineKind, Script};
//!
//! let script = Script::new()
//!     .say(500, "zoe. ca veut dire vie en grec.")
//!     .say_as(800, LineKind::Discovery, "nouveau fragment decouvert.");
//!
//! assert_eq!(script.texts(), vec!["zoe. ca veut dire vie en grec.", "nouveau fragment decouvert."]);
//! ```

use std::time::Duration;

use async_trait::async_trait;

/// Silent gap between two sentences of a remote reply
pub const SENTENCE_PAUSE: Duration = Duration::from_millis(300);

/// Typing indicator shown before each following sentence
pub const SENTENCE_TYPING: Duration = Duration::from_millis(400);

// ============================================================================
// Lines and effects
// ============================================================================

/// Visual category of a line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Regular reply
    #[default]
    Zoe,
    /// Hidden-message reveal
    Fragment,
    /// Milestone (awakening, game discoveries, level-ups)
    Discovery,
    /// Idle thought from the mind loop
    Thought,
    /// Mentor quote from the mind loop
    Mentor,
    /// Unobtrusive system notice (lost connection, key problems)
    Notice,
}

/// One rendered line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// Text as shown
    pub text: String,
    /// Category
    pub kind: LineKind,
}

impl Line {
    /// Create a line
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Cosmetic effect a surface may render (or ignore)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Screen glitch lasting the given time
    Glitch(Duration),
    /// Short reaction to the user's input
    React,
    /// Burst of `n` decorative particles
    Burst(u32),
}

/// One element of a script
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Show a line
    Line {
        /// The line
        line: Line,
        /// Wait before showing it
        delay_before: Duration,
    },
    /// Trigger an effect
    Effect {
        /// The effect
        effect: Effect,
        /// Wait before triggering it
        delay_before: Duration,
    },
    /// Show the typing indicator for `duration`
    Typing {
        /// Indicator duration
        duration: Duration,
        /// Wait before showing the indicator
        delay_before: Duration,
    },
}

impl Step {
    /// Delay preceding this step
    #[must_use]
    pub fn delay_before(&self) -> Duration {
        match self {
            Self::Line { delay_before, .. }
            | Self::Effect { delay_before, .. }
            | Self::Typing { delay_before, .. } => *delay_before,
        }
    }

    /// Line carried by this step, if any
    #[must_use]
    pub fn line(&self) -> Option<&Line> {
        match self {
            Self::Line { line, .. } => Some(line),
            _ => None,
        }
    }
}

// ============================================================================
// Script
// ============================================================================

/// Ordered list of paced steps
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single regular line with no delay
    pub fn line(text: impl Into<String>) -> Self {
        Self::new().say(0, text)
    }

    /// Append a regular line after `delay_ms`
    #[must_use]
    pub fn say(self, delay_ms: u64, text: impl Into<String>) -> Self {
        self.say_as(delay_ms, LineKind::Zoe, text)
    }

    /// Append a line of the given kind after `delay_ms`
    #[must_use]
    pub fn say_as(mut self, delay_ms: u64, kind: LineKind, text: impl Into<String>) -> Self {
        self.push_line(Duration::from_millis(delay_ms), Line::new(kind, text));
        self
    }

    /// Append an effect after `delay_ms`
    #[must_use]
    pub fn effect(mut self, delay_ms: u64, effect: Effect) -> Self {
        self.steps.push(Step::Effect {
            effect,
            delay_before: Duration::from_millis(delay_ms),
        });
        self
    }

    /// Push a line in place
    pub fn push_line(&mut self, delay_before: Duration, line: Line) {
        self.steps.push(Step::Line { line, delay_before });
    }

    /// Append all steps of `other`
    pub fn append(&mut self, other: Script) {
        self.steps.extend(other.steps);
    }

    /// Reveal a free-form reply one sentence at a time
    ///
    /// The first sentence shows immediately; each following one comes
    /// after [`SENTENCE_PAUSE`] and a [`SENTENCE_TYPING`] indicator.
    pub fn sentences(text: &str) -> Self {
        let mut script = Self::new();
        for (i, sentence) in split_sentences(text).into_iter().enumerate() {
            if i > 0 {
                script.steps.push(Step::Typing {
                    duration: SENTENCE_TYPING,
                    delay_before: SENTENCE_PAUSE,
                });
            }
            script.push_line(Duration::ZERO, Line::new(LineKind::Zoe, sentence));
        }
        script
    }

    /// All steps in order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Consume into steps
    #[must_use]
    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    /// Lines only, in order
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.steps.iter().filter_map(Step::line)
    }

    /// Line texts only, in order
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.lines().map(|l| l.text.as_str()).collect()
    }

    /// Effects only, in order
    #[must_use]
    pub fn effects(&self) -> Vec<Effect> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Effect { effect, .. } => Some(*effect),
                _ => None,
            })
            .collect()
    }

    /// Whether there is nothing to play
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Wall-clock time the script takes when played for real
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.steps
            .iter()
            .map(|s| match s {
                Step::Typing {
                    duration,
                    delay_before,
                } => *delay_before + *duration,
                other => other.delay_before(),
            })
            .sum()
    }
}

/// Split text after `.`, `!` or `?` followed by whitespace
///
/// Pieces are trimmed and empty pieces dropped. Text without a terminator
/// yields a single piece.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|next| next.is_whitespace());
        if boundary {
            push_trimmed(&mut out, &current);
            current.clear();
        }
    }
    push_trimmed(&mut out, &current);

    out
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

// ============================================================================
// Playback
// ============================================================================

/// Turns script delays into actual waiting
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for `duration`
    async fn pause(&self, duration: Duration);
}

/// Pacer that never waits (tests, headless runs)
#[derive(Clone, Copy, Debug, Default)]
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

/// Play a script, handing each step to `sink` once its delay has elapsed
///
/// For [`Step::Typing`] the sink is called first (show the indicator) and
/// the pacer then waits out the indicator duration.
pub async fn play<P, F>(script: Script, pacer: &P, mut sink: F)
where
    P: Pacer + ?Sized,
    F: FnMut(Step) + Send,
{
    for step in script.into_steps() {
        pacer.pause(step.delay_before()).await;
        let typing = match &step {
            Step::Typing { duration, .. } => Some(*duration),
            _ => None,
        };
        sink(step);
        if let Some(duration) = typing {
            pacer.pause(duration).await;
        }
    }
}
