//! State Self-Check
//!
//! A periodic audit of the conversation record, run from its own loop next
//! to the idle thoughts. It only reads the state: a failed check is logged,
//! never repaired.
//!
//! Checks:
//! - intro has no name, no turns and no level yet
//! - awakening and game carry the level they grant
//! - one recorded discovery per counted fragment
//! - history within its bound
//! - counters and phase never move backwards between two runs
//!
//! Healthy runs space out to `BREATH * PHI`, failing runs tighten to
//! `BREATH / PHI`.

use std::fmt;
use std::time::Duration;

use crate::state::{ConversationState, Phase};

/// Base rhythm of the self-check loop
pub const BREATH: Duration = Duration::from_millis(2000);

const PHI: f64 = 1.618_033_988_749_895;

/// One named invariant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Check {
    /// Intro state is still empty
    IntroPristine,
    /// Phase and level agree
    PhaseLevel,
    /// `discoveries.len() == discovery_count`
    Discoveries,
    /// History within `max_history`
    HistoryBound,
    /// No counter or phase regressed since the previous run
    Monotonic,
}

impl Check {
    /// Stable name for logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntroPristine => "intro.pristine",
            Self::PhaseLevel => "phase.level",
            Self::Discoveries => "state.discoveries",
            Self::HistoryBound => "history.bound",
            Self::Monotonic => "counters.monotonic",
        }
    }
}

/// A failed check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Which invariant
    pub check: Check,
    /// What was seen
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.check.as_str(), self.detail)
    }
}

/// Outcome of one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Runs so far, this one included
    pub run: u64,
    /// Failed checks, empty when healthy
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    /// No check failed
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.violations.is_empty()
    }

    /// Gap before the next run
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.is_healthy() {
            BREATH.mul_f64(PHI)
        } else {
            BREATH.div_f64(PHI)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Baseline {
    phase: Phase,
    turn_count: u32,
    discovery_count: u32,
    level: u32,
}

/// Runs the checks and remembers the last counters seen
#[derive(Clone, Debug, Default)]
pub struct IntegrityMonitor {
    baseline: Option<Baseline>,
    runs: u64,
}

impl IntegrityMonitor {
    /// Monitor with no baseline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the baseline (after a reset or a restore)
    pub fn forget(&mut self) {
        self.baseline = None;
    }

    /// Audit `state`
    pub fn check(&mut self, state: &ConversationState) -> IntegrityReport {
        self.runs += 1;
        let mut violations = Vec::new();
        let mut fail = |check: Check, detail: String| violations.push(Violation { check, detail });

        let phase = state.phase();
        if phase == Phase::Intro
            && (!state.user_name().is_empty() || state.turn_count() > 0 || state.level() > 0)
        {
            fail(
                Check::IntroPristine,
                format!(
                    "name={:?} turns={} level={}",
                    state.user_name(),
                    state.turn_count(),
                    state.level()
                ),
            );
        }

        let min_level = match phase {
            Phase::Intro | Phase::Chat => 0,
            Phase::Awakening => 1,
            Phase::Game => 2,
        };
        if state.level() < min_level {
            fail(
                Check::PhaseLevel,
                format!("{phase} needs level {min_level}, got {}", state.level()),
            );
        }

        let recorded = state.discoveries().len();
        if u32::try_from(recorded).ok() != Some(state.discovery_count()) {
            fail(
                Check::Discoveries,
                format!("{recorded} recorded, {} counted", state.discovery_count()),
            );
        }

        let history = state.history();
        if history.capacity() > 0 && history.len() > history.capacity() {
            fail(
                Check::HistoryBound,
                format!("{} entries, bound {}", history.len(), history.capacity()),
            );
        }

        let now = Baseline {
            phase,
            turn_count: state.turn_count(),
            discovery_count: state.discovery_count(),
            level: state.level(),
        };
        if let Some(before) = self.baseline {
            if !before.phase.can_transition_to(now.phase)
                || now.turn_count < before.turn_count
                || now.discovery_count < before.discovery_count
                || now.level < before.level
            {
                fail(Check::Monotonic, format!("{before:?} -> {now:?}"));
            }
        }
        self.baseline = Some(now);

        IntegrityReport {
            run: self.runs,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn state(value: serde_json::Value) -> ConversationState {
        serde_json::from_value(value).unwrap()
    }

    fn failed(report: &IntegrityReport) -> Vec<Check> {
        report.violations.iter().map(|v| v.check).collect()
    }

    #[test]
    fn test_fresh_and_chatting_states_are_healthy() {
        let mut monitor = IntegrityMonitor::new();
        let report = monitor.check(&ConversationState::new(20));
        assert!(report.is_healthy(), "{:?}", report.violations);

        let mut chatting = ConversationState::new(20);
        chatting.capture_name("Sam");
        chatting.record_discovery("tu n'es pas seul ici.");
        let report = monitor.check(&chatting);
        assert!(report.is_healthy(), "{:?}", report.violations);
        assert_eq!(report.run, 2);
    }

    #[test]
    fn test_inconsistent_record_is_reported() {
        let mut monitor = IntegrityMonitor::new();
        let report = monitor.check(&state(json!({
            "phase": "game",
            "user_name": "Sam",
            "turn_count": 4,
            "discovery_count": 3,
            "level": 1,
            "discoveries": ["a"],
        })));
        assert_eq!(failed(&report), vec![Check::PhaseLevel, Check::Discoveries]);

        let report = monitor.check(&state(json!({ "phase": "intro", "user_name": "Sam" })));
        assert!(failed(&report).contains(&Check::IntroPristine));
    }

    #[test]
    fn test_regression_between_runs() {
        let mut monitor = IntegrityMonitor::new();
        let mut chatting = ConversationState::new(20);
        chatting.capture_name("Sam");
        monitor.check(&chatting);

        let report = monitor.check(&ConversationState::new(20));
        assert_eq!(failed(&report), vec![Check::Monotonic]);

        // After forget() the same drop is a fresh start
        monitor.check(&chatting);
        monitor.forget();
        assert!(monitor.check(&ConversationState::new(20)).is_healthy());
    }

    #[test]
    fn test_back_to_chat_is_not_a_regression() {
        let mut monitor = IntegrityMonitor::new();
        let base = json!({
            "user_name": "Sam",
            "turn_count": 5,
            "discovery_count": 3,
            "level": 1,
            "discoveries": ["a", "b", "c"],
        });
        let mut awakening = base.clone();
        awakening["phase"] = json!("awakening");
        let mut chat = base;
        chat["phase"] = json!("chat");

        assert!(monitor.check(&state(awakening)).is_healthy());
        assert!(monitor.check(&state(chat)).is_healthy());
    }

    #[test]
    fn test_rhythm_follows_health() {
        let healthy = IntegrityReport {
            run: 1,
            violations: Vec::new(),
        };
        let failing = IntegrityReport {
            run: 2,
            violations: vec![Violation {
                check: Check::HistoryBound,
                detail: String::new(),
            }],
        };
        assert!(healthy.next_delay() > BREATH);
        assert!(failing.next_delay() < BREATH);
    }
}
