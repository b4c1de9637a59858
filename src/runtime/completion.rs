#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::types::{Mission, PlannedStep, Position};

/// Outcome of the pre-completion reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionVerdict {
    /// Every step done and the rover is where the plan ends.
    Complete,
    /// Some steps claim completion their witness does not support.
    FalseCompletions { offsets: Vec<usize> },
    /// Work remains; resume at this offset.
    Incomplete { resume_at: usize },
}

/// A target-bearing step is reached only on exact equality.
#[must_use]
pub fn step_reached(step: &PlannedStep, position: Position) -> bool {
    step.target().is_some_and(|target| target == position)
}

/// Offsets of steps flagged complete whose recorded witness, or, for the
/// final target-bearing step, the live position, does not match the target.
#[must_use]
pub fn false_completions(mission: &Mission) -> Vec<usize> {
    let live = mission.rover_position();
    let last_targeted = mission.plan().last_targeted_offset();

    mission
        .plan()
        .iter()
        .enumerate()
        .filter_map(|(offset, step)| {
            let target = step.target()?;
            let progress = mission.step_progress(offset)?;
            if !progress.completed {
                return None;
            }
            let witness_mismatch = progress.completed_at != Some(target);
            let live_mismatch = Some(offset) == last_targeted && live != target;
            (witness_mismatch || live_mismatch).then_some(offset)
        })
        .collect()
}

/// Decides whether the mission may be declared complete.
#[must_use]
pub fn reconcile(mission: &Mission) -> CompletionVerdict {
    let offsets = false_completions(mission);
    if !offsets.is_empty() {
        return CompletionVerdict::FalseCompletions { offsets };
    }

    let first_open = (0..mission.plan().len()).find(|offset| {
        mission
            .step_progress(*offset)
            .is_some_and(|progress| !progress.completed)
    });
    if let Some(resume_at) = first_open {
        return CompletionVerdict::Incomplete { resume_at };
    }

    if mission.plan().has_return() && !mission.rover_position().is_origin() {
        let resume_at = mission
            .plan()
            .iter()
            .position(PlannedStep::is_return)
            .unwrap_or_else(|| mission.plan().len().saturating_sub(1));
        return CompletionVerdict::Incomplete { resume_at };
    }

    CompletionVerdict::Complete
}
