//! Conversational pacing
//!
//! Real-time [`Pacer`] for the terminal. Script delays are divided by the
//! configured speed; a speed of zero plays everything at once.

use std::time::Duration;

use async_trait::async_trait;
use zoe_core::Pacer;

/// Pacer backed by the tokio timer
#[derive(Clone, Copy, Debug)]
pub struct TokioPacer {
    speed: f64,
}

impl TokioPacer {
    /// Pacer running at `speed` (1.0 = as scripted)
    #[must_use]
    pub fn new(speed: f64) -> Self {
        Self { speed }
    }

    /// How long a scripted `duration` actually lasts
    #[must_use]
    pub fn scaled(&self, duration: Duration) -> Duration {
        if self.speed <= 0.0 || !self.speed.is_finite() {
            return Duration::ZERO;
        }
        duration.div_f64(self.speed)
    }
}

impl Default for TokioPacer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        let scaled = self.scaled(duration);
        if scaled.is_zero() {
            tokio::task::yield_now().await;
        } else {
            // Conversational pacing: typing delays between lines
            tokio::time::sleep(scaled).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe_core::{play, Script};

    #[test]
    fn test_scaling() {
        let d = Duration::from_millis(600);
        assert_eq!(TokioPacer::new(1.0).scaled(d), d);
        assert_eq!(TokioPacer::new(2.0).scaled(d), Duration::from_millis(300));
        assert_eq!(TokioPacer::new(0.0).scaled(d), Duration::ZERO);
        assert_eq!(TokioPacer::new(f64::NAN).scaled(d), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_in_script_time() {
        let script = Script::new().say(500, "hey.").say(1000, "c'est quoi ton prenom?");
        let start = tokio::time::Instant::now();
        let mut seen = Vec::new();

        play(script, &TokioPacer::new(2.0), |step| {
            seen.push((step.line().map(|l| l.text.clone()), start.elapsed()));
        })
        .await;

        assert_eq!(
            seen,
            vec![
                (Some("hey.".to_string()), Duration::from_millis(250)),
                (
                    Some("c'est quoi ton prenom?".to_string()),
                    Duration::from_millis(750)
                ),
            ]
        );
    }
}
