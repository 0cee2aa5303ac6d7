//! Process lifecycle state machine.
//!
//! # States
//! ```text
//! Starting → Serving → Draining → Stopped
//! ```
//!
//! Transitions only move forward; an attempt to go back is ignored and logged.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Serving = 1,
    Draining = 2,
    Stopped = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Starting,
            1 => Phase::Serving,
            2 => Phase::Draining,
            _ => Phase::Stopped,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::Serving => "serving",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared, lock-free view of the current [`Phase`].
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phase: Arc<AtomicU8>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(AtomicU8::new(Phase::Starting as u8)),
        }
    }

    pub fn get(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Advance to `next`. Returns false if that would move backwards.
    pub fn advance(&self, next: Phase) -> bool {
        let result = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (next as u8 > current).then_some(next as u8)
            });

        match result {
            Ok(previous) => {
                tracing::info!(from = %Phase::from_u8(previous), to = %next, "Lifecycle transition");
                true
            }
            Err(current) => {
                tracing::debug!(current = %Phase::from_u8(current), requested = %next, "Ignored lifecycle transition");
                false
            }
        }
    }

    pub fn is_serving(&self) -> bool {
        self.get() == Phase::Serving
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_move_forward_only() {
        let tracker = PhaseTracker::new();
        assert_eq!(tracker.get(), Phase::Starting);
        assert!(tracker.advance(Phase::Serving));
        assert!(tracker.is_serving());
        assert!(tracker.advance(Phase::Draining));
        assert!(!tracker.advance(Phase::Serving));
        assert_eq!(tracker.get(), Phase::Draining);
        assert!(tracker.advance(Phase::Stopped));
        assert!(!tracker.advance(Phase::Stopped));
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = PhaseTracker::new();
        let view = tracker.clone();
        tracker.advance(Phase::Serving);
        assert!(view.is_serving());
    }
}
