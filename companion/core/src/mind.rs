//! Mind: idle thoughts and mentors
//!
//! When the user goes quiet Zoe starts thinking out loud. The surface runs
//! a loop that sleeps [`MindConfig::next_tick`] between ticks and feeds
//! each tick to [`Mind::tick`]; user input calls [`Mind::reset_idle`].
//!
//! The mind owns only its idle counter. It reads the phase but never
//! touches turn or discovery counters, so its output may interleave with a
//! turn without breaking anything.

use std::f64::consts::{E, PI};
use std::time::Duration;

use rand::{Rng, RngCore};

use crate::content::{pick, MENTORS, THOUGHTS};
use crate::script::{Line, LineKind, Script};
use crate::state::Phase;

/// Golden ratio
const PHI: f64 = 1.618_033_988_749_895;

/// Idle loop settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MindConfig {
    /// Shortest gap between ticks
    pub tick_min: Duration,
    /// Longest gap between ticks
    pub tick_max: Duration,
    /// Idle ticks before thoughts may appear (strictly more than this)
    pub think_after: u32,
    /// Idle ticks before mentors may speak (strictly more than this)
    pub mentor_after: u32,
    /// Thought probability factor applied to the wave
    pub think_weight: f64,
    /// Mentor probability factor applied to the wave
    pub mentor_weight: f64,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            tick_min: Duration::from_secs(2),
            tick_max: Duration::from_secs(5),
            think_after: 3,
            mentor_after: 5,
            think_weight: 0.5,
            mentor_weight: 0.3,
        }
    }
}

impl MindConfig {
    /// Random gap before the next tick, in `[tick_min, tick_max]`
    pub fn next_tick(&self, rng: &mut dyn RngCore) -> Duration {
        if self.tick_max <= self.tick_min {
            return self.tick_min;
        }
        let min = self.tick_min.as_millis();
        let max = self.tick_max.as_millis();
        let span = u64::try_from(max - min).unwrap_or(u64::MAX);
        self.tick_min + Duration::from_millis(rng.gen_range(0..=span))
    }
}

/// Slow organic oscillation in `[0, 1]`
///
/// Three sines with periods scaled by phi, e and pi around a 0.5
/// baseline. `elapsed` is time since the session started.
#[must_use]
pub fn wave(elapsed: Duration) -> f64 {
    let t = elapsed.as_secs_f64();
    let value = 0.5 + (t / PHI).sin() * 0.3 + (t / E).sin() * 0.2 + (t / PI).sin() * 0.2;
    value.clamp(0.0, 1.0)
}

/// "Name: quote" line from a random mentor
pub fn mentor_line(rng: &mut dyn RngCore) -> Line {
    let index = rng.gen_range(0..MENTORS.len());
    let mentor = MENTORS[index];
    Line::new(
        LineKind::Mentor,
        format!("{}: {}", mentor.name, pick(mentor.quotes, rng)),
    )
}

/// Idle-time state
#[derive(Clone, Debug, Default)]
pub struct Mind {
    config: MindConfig,
    idle_ticks: u32,
}

impl Mind {
    /// Create a mind with the given settings
    #[must_use]
    pub fn new(config: MindConfig) -> Self {
        Self {
            config,
            idle_ticks: 0,
        }
    }

    /// Settings
    #[must_use]
    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    /// Ticks since the last input
    #[must_use]
    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    /// The user typed something
    pub fn reset_idle(&mut self) {
        self.idle_ticks = 0;
    }

    /// Advance one tick and return whatever Zoe thinks out loud
    ///
    /// Silent outside chat and game.
    pub fn tick(&mut self, phase: Phase, elapsed: Duration, rng: &mut dyn RngCore) -> Script {
        self.idle_ticks = self.idle_ticks.saturating_add(1);

        let mut script = Script::new();
        if !matches!(phase, Phase::Chat | Phase::Game) {
            return script;
        }

        let w = wave(elapsed);

        if self.idle_ticks > self.config.think_after
            && rng.gen::<f64>() < w * self.config.think_weight
        {
            script.push_line(Duration::ZERO, Line::new(LineKind::Thought, pick(THOUGHTS, rng)));
        }

        if self.idle_ticks > self.config.mentor_after
            && rng.gen::<f64>() < w * self.config.mentor_weight
        {
            script.push_line(Duration::ZERO, mentor_line(rng));
        }

        if !script.is_empty() {
            tracing::debug!(idle_ticks = self.idle_ticks, wave = w, "Mind spoke");
        }
        script
    }
}
