use super::grid::Position;
use rpds::VectorSync;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Kind of work a single plan step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Move,
    Explore,
    Scan,
    Collect,
    Return,
}

impl StepKind {
    pub const ALL: [Self; 5] = [
        Self::Move,
        Self::Explore,
        Self::Scan,
        Self::Collect,
        Self::Return,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Explore => "explore",
            Self::Scan => "scan",
            Self::Collect => "collect",
            Self::Return => "return",
        }
    }

    /// Whether a step of this kind is meaningless without a target cell.
    #[must_use]
    pub const fn requires_target(&self) -> bool {
        matches!(self, Self::Move | Self::Explore | Self::Return)
    }

    /// Kinds that ask for findings once the rover stands on the target.
    #[must_use]
    pub const fn surveys(&self) -> bool {
        matches!(self, Self::Explore | Self::Scan | Self::Collect)
    }

    /// Tolerant matching for action names coming from oracles.
    ///
    /// Accepts any casing, a handful of common synonyms and small typos.
    #[must_use]
    pub fn from_action(action: &str) -> Option<Self> {
        let normalized = action.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        if normalized.is_empty() {
            return None;
        }
        if let Ok(kind) = Self::try_from(normalized.as_str()) {
            return Some(kind);
        }

        let synonym = match normalized.as_str() {
            "go" | "goto" | "go_to" | "navigate" | "travel" | "drive" | "move_to" => {
                Some(Self::Move)
            }
            "survey" | "investigate" | "examine" | "search" => Some(Self::Explore),
            "analyze" | "analyse" | "photograph" | "image" | "inspect" | "observe" => {
                Some(Self::Scan)
            }
            "sample" | "gather" | "pickup" | "pick_up" | "dig" => Some(Self::Collect),
            "home" | "base" | "return_to_base" | "rtb" | "go_home" => Some(Self::Return),
            _ => None,
        };
        if synonym.is_some() {
            return synonym;
        }

        Self::ALL
            .iter()
            .map(|kind| (*kind, strsim::levenshtein(&normalized, kind.as_str())))
            .filter(|(_, distance)| *distance <= 2)
            .min_by_key(|(_, distance)| *distance)
            .map(|(kind, _)| kind)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for StepKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "move" => Ok(Self::Move),
            "explore" => Ok(Self::Explore),
            "scan" => Ok(Self::Scan),
            "collect" => Ok(Self::Collect),
            "return" => Ok(Self::Return),
            _ => Err(format!("Unknown step kind: {s}")),
        }
    }
}

/// Immutable part of a step, fixed once the plan is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    index: usize,
    kind: StepKind,
    target: Option<Position>,
    description: String,
}

impl PlannedStep {
    #[must_use]
    pub fn new(
        index: usize,
        kind: StepKind,
        target: Option<Position>,
        description: impl Into<String>,
    ) -> Self {
        let target = if kind == StepKind::Return {
            Some(Position::ORIGIN)
        } else {
            target
        };
        Self {
            index,
            kind,
            target,
            description: description.into(),
        }
    }

    /// 1-based position in the plan.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn kind(&self) -> StepKind {
        self.kind
    }

    #[must_use]
    pub const fn target(&self) -> Option<Position> {
        self.target
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn is_return(&self) -> bool {
        matches!(self.kind, StepKind::Return)
    }

    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: Position) -> Self {
        self.target = Some(target);
        self
    }
}

/// Ordered, immutable step list for one mission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MissionPlan {
    steps: VectorSync<PlannedStep>,
}

impl MissionPlan {
    /// Builds a plan, renumbering steps `1..=n` in the given order.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = PlannedStep>) -> Self {
        let steps = steps
            .into_iter()
            .enumerate()
            .fold(VectorSync::new_sync(), |acc, (offset, step)| {
                acc.push_back(step.with_index(offset + 1))
            });
        Self { steps }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Zero-based lookup.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<&PlannedStep> {
        self.steps.get(offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedStep> {
        self.steps.iter()
    }

    #[must_use]
    pub fn has_return(&self) -> bool {
        self.steps.iter().any(PlannedStep::is_return)
    }

    /// Offset of the last step that carries a target.
    #[must_use]
    pub fn last_targeted_offset(&self) -> Option<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.target().is_some())
            .map(|(offset, _)| offset)
            .last()
    }

    /// Distinct step targets in plan order.
    #[must_use]
    pub fn goal_positions(&self) -> Vec<Position> {
        self.steps
            .iter()
            .filter_map(PlannedStep::target)
            .fold(Vec::new(), |mut acc, target| {
                if !acc.contains(&target) {
                    acc.push(target);
                }
                acc
            })
    }
}

/// Mutable part of a step, tracked by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepProgress {
    pub completed: bool,
    pub attachment: Option<Url>,
    /// Live rover position at the moment the step was marked complete.
    pub completed_at: Option<Position>,
}

/// Read-only view joining a planned step with its progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    pub kind: StepKind,
    pub target: Option<Position>,
    pub description: String,
    pub completed: bool,
    pub attachment: Option<Url>,
}

impl Step {
    #[must_use]
    pub fn from_parts(planned: &PlannedStep, progress: &StepProgress) -> Self {
        Self {
            index: planned.index(),
            kind: planned.kind(),
            target: planned.target(),
            description: planned.description().to_string(),
            completed: progress.completed,
            attachment: progress.attachment.clone(),
        }
    }
}
