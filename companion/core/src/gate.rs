//! Input Gate
//!
//! At most one turn in flight. A surface asks the gate for a [`TurnGuard`]
//! before handing text to the responder and keeps it until the reply has
//! finished playing. Dropping the guard reopens input, including when the
//! turn task errors out or panics, so the surface can never stay stuck.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "turn in progress" flag
#[derive(Clone, Debug, Default)]
pub struct InputGate {
    busy: Arc<AtomicBool>,
}

impl InputGate {
    /// Open gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate, or `None` if a turn is already running
    #[must_use]
    pub fn begin_turn(&self) -> Option<TurnGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TurnGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether input is accepted right now
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the current turn
#[must_use = "input reopens as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TurnGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
