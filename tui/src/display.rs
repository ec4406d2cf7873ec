//! Display State Types
//!
//! What the terminal currently shows, derived from [`UiEvent`]s that turn
//! tasks and the idle loop send to the app.
//!
//! # Design Philosophy
//!
//! The TUI is a "thin client": the responder decides what Zoe says and
//! when, the display only accumulates lines and runs effect timers. It never
//! reads or writes conversation counters; the HUD shows the last
//! [`HudStatus`] it was handed.

use std::time::Duration;

use zoe_core::{Choice, Effect, LineKind, StateSnapshot, Step};

/// Lines kept on screen before the oldest scroll away for good
pub const MAX_DISPLAY_LINES: usize = 500;

/// How long the react pulse lasts
pub const REACT_DURATION: Duration = Duration::from_millis(300);

/// Events sent to the app's display
#[derive(Clone, Debug, PartialEq)]
pub enum UiEvent {
    /// A script step whose delay has elapsed
    Step(Step),
    /// Choices to offer (replaces any previous set)
    Choices(Vec<Choice>),
    /// Fresh HUD values
    Status(HudStatus),
    /// The running turn has finished playing
    TurnDone,
}

/// HUD values, read from the responder after each turn
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HudStatus {
    /// Counters and phase
    pub snapshot: StateSnapshot,
    /// Whether a usable key is configured
    pub has_credential: bool,
    /// Whether the completion service was reachable last time
    pub online: bool,
    /// Whether saves were abandoned
    pub degraded: bool,
}

impl HudStatus {
    /// One-line HUD text
    #[must_use]
    pub fn describe(&self) -> String {
        let s = &self.snapshot;
        let mut text = format!(
            "{} | eveil {} | fragments {} | tours {}",
            s.phase, s.level, s.discovery_count, s.turn_count
        );
        if !self.has_credential {
            text.push_str(" | sans cle");
        } else if !self.online {
            text.push_str(" | hors ligne");
        }
        if self.degraded {
            text.push_str(" | non sauvegarde");
        }
        text
    }
}

/// Who a line belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayRole {
    /// Typed by the user
    User,
    /// Said (or thought) by Zoe
    Zoe(LineKind),
}

/// A rendered conversation line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayLine {
    /// Who said it
    pub role: DisplayRole,
    /// The text
    pub text: String,
}

/// Everything the renderer needs
#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    /// Conversation, oldest first
    pub lines: Vec<DisplayLine>,
    /// Choices currently offered
    pub choices: Vec<Choice>,
    /// Last HUD values
    pub status: HudStatus,
    /// Whether a turn is running (input closed)
    pub busy: bool,
    typing: Duration,
    glitch: Duration,
    react: Duration,
    sparkles: u32,
}

impl DisplayState {
    /// Empty display
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo the user's message
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(DisplayLine {
            role: DisplayRole::User,
            text: text.into(),
        });
    }

    /// Apply one event
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Step(step) => self.apply_step(step),
            UiEvent::Choices(choices) => self.choices = choices,
            UiEvent::Status(status) => self.status = status,
            UiEvent::TurnDone => {
                self.busy = false;
                self.typing = Duration::ZERO;
            }
        }
    }

    fn apply_step(&mut self, step: Step) {
        match step {
            Step::Line { line, .. } => {
                self.typing = Duration::ZERO;
                self.push(DisplayLine {
                    role: DisplayRole::Zoe(line.kind),
                    text: line.text,
                });
            }
            Step::Typing { duration, .. } => self.typing = duration,
            Step::Effect { effect, .. } => match effect {
                Effect::Glitch(duration) => self.glitch = self.glitch.max(duration),
                Effect::React => self.react = REACT_DURATION,
                Effect::Burst(count) => self.sparkles = self.sparkles.saturating_add(count),
            },
        }
    }

    fn push(&mut self, line: DisplayLine) {
        self.lines.push(line);
        if self.lines.len() > MAX_DISPLAY_LINES {
            let excess = self.lines.len() - MAX_DISPLAY_LINES;
            self.lines.drain(..excess);
        }
    }

    /// Advance effect timers
    pub fn update(&mut self, delta: Duration) {
        self.typing = self.typing.saturating_sub(delta);
        self.glitch = self.glitch.saturating_sub(delta);
        self.react = self.react.saturating_sub(delta);
        if !delta.is_zero() && self.sparkles > 0 {
            self.sparkles -= (self.sparkles / 8).max(1);
        }
    }

    /// Offer no choices any more
    pub fn clear_choices(&mut self) {
        self.choices.clear();
    }

    /// Forget the conversation shown so far
    pub fn clear(&mut self) {
        self.lines.clear();
        self.choices.clear();
    }

    /// Typing indicator visible
    #[must_use]
    pub fn is_typing(&self) -> bool {
        !self.typing.is_zero()
    }

    /// Glitch running
    #[must_use]
    pub fn is_glitching(&self) -> bool {
        !self.glitch.is_zero()
    }

    /// React pulse running
    #[must_use]
    pub fn is_reacting(&self) -> bool {
        !self.react.is_zero()
    }

    /// Sparkles left on screen
    #[must_use]
    pub fn sparkles(&self) -> u32 {
        self.sparkles
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use zoe_core::{ChoiceAction, Line, Phase};

    fn line(kind: LineKind, text: &str) -> UiEvent {
        UiEvent::Step(Step::Line {
            line: Line::new(kind, text),
            delay_before: Duration::ZERO,
        })
    }

    fn effect(effect: Effect) -> UiEvent {
        UiEvent::Step(Step::Effect {
            effect,
            delay_before: Duration::ZERO,
        })
    }

    #[test]
    fn test_lines_accumulate_in_order() {
        let mut display = DisplayState::new();
        display.push_user("Sam");
        display.apply(line(LineKind::Zoe, "Sam."));
        display.apply(line(LineKind::Fragment, "tu n'es pas seul ici."));

        let roles: Vec<_> = display.lines.iter().map(|l| l.role).collect();
        assert_eq!(
            roles,
            vec![
                DisplayRole::User,
                DisplayRole::Zoe(LineKind::Zoe),
                DisplayRole::Zoe(LineKind::Fragment),
            ]
        );
    }

    #[test]
    fn test_typing_indicator_until_next_line() {
        let mut display = DisplayState::new();
        display.apply(UiEvent::Step(Step::Typing {
            duration: Duration::from_millis(400),
            delay_before: Duration::ZERO,
        }));
        assert!(display.is_typing());

        display.update(Duration::from_millis(100));
        assert!(display.is_typing());

        display.apply(line(LineKind::Zoe, "moi jamais."));
        assert!(!display.is_typing());
    }

    #[test]
    fn test_effect_timers_run_out() {
        let mut display = DisplayState::new();
        display.apply(effect(Effect::Glitch(Duration::from_millis(500))));
        display.apply(effect(Effect::React));
        display.apply(effect(Effect::Burst(20)));
        assert!(display.is_glitching());
        assert!(display.is_reacting());
        assert_eq!(display.sparkles(), 20);

        for _ in 0..30 {
            display.update(Duration::from_millis(100));
        }
        assert!(!display.is_glitching());
        assert!(!display.is_reacting());
        assert_eq!(display.sparkles(), 0);
    }

    #[test]
    fn test_choices_and_turn_done() {
        let mut display = DisplayState::new();
        display.busy = true;
        display.apply(UiEvent::Choices(vec![Choice {
            label: "explique-moi",
            action: ChoiceAction::Explain,
        }]));
        display.apply(UiEvent::TurnDone);

        assert_eq!(display.choices.len(), 1);
        assert!(!display.busy);
        display.clear_choices();
        assert!(display.choices.is_empty());
    }

    #[test]
    fn test_line_cap() {
        let mut display = DisplayState::new();
        for i in 0..MAX_DISPLAY_LINES + 10 {
            display.push_user(format!("{i}"));
        }
        assert_eq!(display.lines.len(), MAX_DISPLAY_LINES);
        assert_eq!(display.lines[0].text, "10");
    }

    #[test]
    fn test_hud_description() {
        let mut status = HudStatus {
            snapshot: StateSnapshot {
                phase: Phase::Game,
                user_name: "Sam".to_string(),
                turn_count: 12,
                discovery_count: 7,
                level: 3,
            },
            has_credential: true,
            online: true,
            degraded: false,
        };
        assert_eq!(status.describe(), "game | eveil 3 | fragments 7 | tours 12");

        status.online = false;
        assert!(status.describe().ends_with("tours 12 | hors ligne"));

        status.has_credential = false;
        status.degraded = true;
        assert!(status.describe().ends_with("tours 12 | sans cle | non sauvegarde"));
    }
}
