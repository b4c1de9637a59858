#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Typed outcome of one movement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementEvent {
    /// Admitted move onto a fresh cell that reduced the distance.
    Advanced,
    /// Admitted move onto a fresh cell that did not reduce the distance.
    Detoured,
    /// Admitted move onto a cell already visited while working this step.
    Revisited,
    ObstacleRejected,
    OutOfBoundsRejected,
    AdvisoryRejected,
    /// No candidate other than the current cell was available.
    Stalled,
}

impl MovementEvent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Advanced => "advanced",
            Self::Detoured => "detoured",
            Self::Revisited => "revisited",
            Self::ObstacleRejected => "obstacle_rejected",
            Self::OutOfBoundsRejected => "out_of_bounds_rejected",
            Self::AdvisoryRejected => "advisory_rejected",
            Self::Stalled => "stalled",
        }
    }

    /// Events that count toward the abort threshold.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        !matches!(self, Self::Advanced | Self::Detoured)
    }
}

/// Fixed-capacity ring of the most recent movement events.
///
/// Old events fall out as new ones arrive, so a mission that recovers from a
/// blocked patch stops accumulating toward the abort threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionWindow {
    capacity: usize,
    events: VecDeque<MovementEvent>,
}

impl RejectionWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Records an event and returns the blocking count afterwards.
    pub fn record(&mut self, event: MovementEvent) -> usize {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.blocking_count()
    }

    #[must_use]
    pub fn blocking_count(&self) -> usize {
        self.events.iter().filter(|event| event.is_blocking()).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovementEvent> {
        self.events.iter()
    }
}

impl Default for RejectionWindow {
    fn default() -> Self {
        Self::new(20)
    }
}

#[cfg(test)]
mod tests {
    use super::{MovementEvent, RejectionWindow};

    #[test]
    fn neutral_events_do_not_count() {
        let mut window = RejectionWindow::new(5);
        assert_eq!(window.record(MovementEvent::Advanced), 0);
        assert_eq!(window.record(MovementEvent::Detoured), 0);
        assert_eq!(window.record(MovementEvent::ObstacleRejected), 1);
        assert_eq!(window.record(MovementEvent::Revisited), 2);
        assert_eq!(window.record(MovementEvent::Stalled), 3);
    }

    #[test]
    fn old_rejections_age_out() {
        let mut window = RejectionWindow::new(3);
        window.record(MovementEvent::ObstacleRejected);
        window.record(MovementEvent::ObstacleRejected);
        assert_eq!(window.blocking_count(), 2);

        window.record(MovementEvent::Advanced);
        window.record(MovementEvent::Advanced);
        assert_eq!(window.blocking_count(), 1);

        window.record(MovementEvent::Advanced);
        assert_eq!(window.blocking_count(), 0);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut window = RejectionWindow::new(0);
        window.record(MovementEvent::Stalled);
        window.record(MovementEvent::Stalled);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.blocking_count(), 1);
    }

    #[test]
    fn rejection_classification() {
        assert!(MovementEvent::AdvisoryRejected.is_blocking());
        assert!(MovementEvent::Stalled.is_blocking());
        assert!(!MovementEvent::Detoured.is_blocking());
    }
}
