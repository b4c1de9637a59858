#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::types::{Grid, MissionPlan, PlannedStep, Position, StepKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Coordinate spellings accepted in goal text, most specific first.
static COORDINATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\((\d+)\s*,\s*(\d+)\)",
        r"(?i)\bx\s*[=:]\s*(\d+)\s*[,;]\s*y\s*[=:]\s*(\d+)",
        r"(?i)\bcoordinates?\s+(\d+)\s*,\s*(\d+)",
        r"(?i)\bposition\s+(\d+)\s*,\s*(\d+)",
        r"(?i)\bat\s+(\d+)\s*,\s*(\d+)",
        r"(?i)\bat\s+(\d+)\s+(\d+)",
        r"(\d+)\s*,\s*(\d+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// One step as proposed by a planning oracle, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedStep {
    pub action: String,
    pub target: Option<Position>,
    pub description: String,
}

impl ProposedStep {
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        target: Option<Position>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            target,
            description: description.into(),
        }
    }
}

/// Normalized plan plus notes on every correction applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPlan {
    pub plan: MissionPlan,
    pub corrections: Vec<String>,
}

/// First in-bounds coordinate pair mentioned in the goal text.
#[must_use]
pub fn extract_goal_coordinates(goal: &str, grid: Grid) -> Option<Position> {
    COORDINATE_PATTERNS.iter().find_map(|pattern| {
        pattern.captures_iter(goal).find_map(|captures| {
            let x = captures.get(1)?.as_str().parse::<i32>().ok()?;
            let y = captures.get(2)?.as_str().parse::<i32>().ok()?;
            let position = Position::new(x, y);
            grid.contains(position).then_some(position)
        })
    })
}

/// Minimal plan used when the planning oracle gives nothing usable.
#[must_use]
pub fn fallback_plan(goal: &str, grid: Grid) -> MissionPlan {
    let target = extract_goal_coordinates(goal, grid).unwrap_or_else(|| grid.center());
    MissionPlan::new(fallback_steps(target).into_iter().chain([return_step(None)]))
}

/// Turns oracle output into a plan the orchestrator can execute.
///
/// Unknown actions, misplaced returns and steps missing a required or
/// in-bounds target are dropped. When the goal names coordinates the first
/// actionable step is pinned to them. Exactly one return to the origin ends
/// the plan.
#[must_use]
pub fn normalize_plan(proposed: Vec<ProposedStep>, goal: &str, grid: Grid) -> NormalizedPlan {
    let goal_target = extract_goal_coordinates(goal, grid);
    let mut corrections = Vec::new();
    let mut return_description = None;

    let mut actionable: Vec<PlannedStep> = Vec::with_capacity(proposed.len() + 1);
    let total = proposed.len();
    for (offset, step) in proposed.into_iter().enumerate() {
        let Some(kind) = StepKind::from_action(&step.action) else {
            corrections.push(format!("dropped step with unknown action '{}'", step.action));
            continue;
        };
        if kind == StepKind::Return {
            if offset + 1 == total {
                return_description = Some(step.description);
            } else {
                corrections.push(format!("dropped non-terminal return at position {}", offset + 1));
            }
            continue;
        }
        actionable.push(PlannedStep::new(0, kind, step.target, step.description));
    }

    if let Some(target) = goal_target {
        pin_first_step(&mut actionable, target, &mut corrections);
    }

    let before = actionable.len();
    actionable.retain(|step| match step.target() {
        Some(target) => grid.contains(target),
        None => !step.kind().requires_target(),
    });
    if actionable.len() < before {
        corrections.push(format!(
            "dropped {} step(s) with missing or out-of-bounds targets",
            before - actionable.len()
        ));
    }

    if actionable.is_empty() {
        let target = goal_target.unwrap_or_else(|| grid.center());
        corrections.push(format!("no actionable steps; synthesized survey of {target}"));
        actionable = fallback_steps(target);
    }

    let plan = MissionPlan::new(
        actionable
            .into_iter()
            .chain([return_step(return_description)]),
    );
    NormalizedPlan { plan, corrections }
}

fn pin_first_step(steps: &mut Vec<PlannedStep>, target: Position, corrections: &mut Vec<String>) {
    let Some(first) = steps.first() else {
        return;
    };
    match first.kind() {
        StepKind::Move | StepKind::Explore => {
            if first.target() != Some(target) {
                corrections.push(format!("retargeted first step to goal coordinates {target}"));
                let pinned = first.clone().with_target(target);
                steps[0] = pinned;
            }
        }
        StepKind::Scan | StepKind::Collect => {
            corrections.push(format!("inserted move to goal coordinates {target}"));
            steps.insert(
                0,
                PlannedStep::new(0, StepKind::Move, Some(target), format!("Navigate to {target}")),
            );
        }
        StepKind::Return => {}
    }
}

fn fallback_steps(target: Position) -> Vec<PlannedStep> {
    vec![
        PlannedStep::new(0, StepKind::Move, Some(target), format!("Navigate to {target}")),
        PlannedStep::new(
            0,
            StepKind::Explore,
            Some(target),
            format!("Explore the area around {target}"),
        ),
    ]
}

fn return_step(description: Option<String>) -> PlannedStep {
    PlannedStep::new(
        0,
        StepKind::Return,
        Some(Position::ORIGIN),
        description
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "Return to base at (0, 0)".to_string()),
    )
}
