#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! Deterministic collaborators that need no network access.

use crate::error::OracleError;
use crate::ports::{
    AdvisoryOracle, AdvisoryRequest, AdvisoryVerdict, EnrichmentProvider, MissionReporter,
    NavigationAdvice, NavigationOracle, NavigationRequest, PlanningOracle, PortFuture,
    ProgressSink,
};
use crate::report::MissionReport;
use crate::runtime::{extract_goal_coordinates, ProposedStep};
use crate::types::{Grid, MissionSnapshot, Position, ProgressUpdate, StepKind};
use itertools::Itertools;
use serde_json::Value;
use tokio::sync::broadcast;
use url::Url;

const ACTION_KEYWORDS: &[(&str, StepKind)] = &[
    ("explore", StepKind::Explore),
    ("survey", StepKind::Explore),
    ("investigate", StepKind::Explore),
    ("scan", StepKind::Scan),
    ("analy", StepKind::Scan),
    ("photo", StepKind::Scan),
    ("image", StepKind::Scan),
    ("inspect", StepKind::Scan),
    ("collect", StepKind::Collect),
    ("sample", StepKind::Collect),
    ("gather", StepKind::Collect),
];

/// Plans from coordinates and action words found in the goal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordPlanner {
    grid: Grid,
}

impl KeywordPlanner {
    #[must_use]
    pub const fn new(grid: Grid) -> Self {
        Self { grid }
    }

    /// # Errors
    /// Returns `OracleError::Malformed` when the goal names no in-bounds
    /// coordinates.
    pub fn steps_for(&self, goal: &str) -> Result<Vec<ProposedStep>, OracleError> {
        let target = extract_goal_coordinates(goal, self.grid).ok_or_else(|| {
            OracleError::Malformed(format!("no coordinates found in goal '{goal}'"))
        })?;
        let lowered = goal.to_ascii_lowercase();

        let actions = ACTION_KEYWORDS
            .iter()
            .filter_map(|(keyword, kind)| lowered.find(keyword).map(|at| (at, *kind)))
            .sorted_by_key(|(at, _)| *at)
            .map(|(_, kind)| kind)
            .unique();

        let mut steps = vec![ProposedStep::new(
            StepKind::Move.as_str(),
            Some(target),
            format!("Navigate to {target}"),
        )];
        steps.extend(actions.map(|kind| match kind {
            StepKind::Explore => {
                ProposedStep::new(kind.as_str(), Some(target), format!("Explore around {target}"))
            }
            _ => ProposedStep::new(kind.as_str(), None, format!("{kind} at {target}")),
        }));
        steps.push(ProposedStep::new(
            StepKind::Return.as_str(),
            Some(Position::ORIGIN),
            "Return to base",
        ));
        Ok(steps)
    }
}

impl PlanningOracle for KeywordPlanner {
    fn plan<'a>(&'a self, goal: &'a str) -> PortFuture<'a, Vec<ProposedStep>> {
        Box::pin(async move { self.steps_for(goal) })
    }
}

/// Offers no movement suggestions, so every move comes from the path
/// resolver, and writes plain findings for survey steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadReckoningNavigator;

impl NavigationOracle for DeadReckoningNavigator {
    fn advise<'a>(&'a self, request: &'a NavigationRequest) -> PortFuture<'a, NavigationAdvice> {
        Box::pin(async move {
            let step = &request.step;
            let on_target = step.target.map_or(true, |target| target == request.position);
            let findings = (on_target && step.kind.surveys()).then(|| {
                format!(
                    "{} at {}: {}",
                    step.kind, request.position, step.description
                )
            });
            Ok(NavigationAdvice {
                candidate: None,
                action: Some(step.kind.as_str().to_string()),
                request_attachment: false,
                findings,
            })
        })
    }
}

/// Concurs with every move; the deterministic check stands alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurringAdvisory;

impl AdvisoryOracle for ConcurringAdvisory {
    fn review<'a>(&'a self, request: &'a AdvisoryRequest) -> PortFuture<'a, AdvisoryVerdict> {
        Box::pin(async move {
            Ok(AdvisoryVerdict::approve(format!(
                "no objection to {} -> {}",
                request.current, request.proposed
            )))
        })
    }
}

/// No environment feed and no imagery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEnrichment;

impl EnrichmentProvider for NullEnrichment {
    fn environment<'a>(&'a self, _goal: &'a str) -> PortFuture<'a, Value> {
        Box::pin(async { Err(OracleError::Unavailable("no environment feed".to_string())) })
    }

    fn imagery(&self, _position: Position) -> PortFuture<'_, Url> {
        Box::pin(async { Err(OracleError::Unavailable("no imagery source".to_string())) })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryReporter;

impl MissionReporter for SummaryReporter {
    fn report<'a>(&'a self, snapshot: &'a MissionSnapshot) -> PortFuture<'a, MissionReport> {
        Box::pin(async move { Ok(MissionReport::from_snapshot(snapshot)) })
    }
}

/// Fans progress out over a tokio broadcast channel. Updates sent with no
/// subscriber, or to a lagging one, are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressUpdate>,
}

impl BroadcastProgress {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }
}

impl ProgressSink for BroadcastProgress {
    fn publish(&self, update: ProgressUpdate) {
        let _ = self.sender.send(update);
    }
}

/// All built-in collaborators bundled as one port set.
#[derive(Debug, Clone)]
pub struct LocalPorts {
    pub planner: KeywordPlanner,
    pub navigator: DeadReckoningNavigator,
    pub advisory: ConcurringAdvisory,
    pub enrichment: NullEnrichment,
    pub reporter: SummaryReporter,
    pub progress: BroadcastProgress,
}

impl LocalPorts {
    #[must_use]
    pub fn new(grid: Grid, progress_capacity: usize) -> Self {
        Self {
            planner: KeywordPlanner::new(grid),
            navigator: DeadReckoningNavigator,
            advisory: ConcurringAdvisory,
            enrichment: NullEnrichment,
            reporter: SummaryReporter,
            progress: BroadcastProgress::new(progress_capacity),
        }
    }
}

impl PlanningOracle for LocalPorts {
    fn plan<'a>(&'a self, goal: &'a str) -> PortFuture<'a, Vec<ProposedStep>> {
        self.planner.plan(goal)
    }
}

impl NavigationOracle for LocalPorts {
    fn advise<'a>(&'a self, request: &'a NavigationRequest) -> PortFuture<'a, NavigationAdvice> {
        self.navigator.advise(request)
    }
}

impl AdvisoryOracle for LocalPorts {
    fn review<'a>(&'a self, request: &'a AdvisoryRequest) -> PortFuture<'a, AdvisoryVerdict> {
        self.advisory.review(request)
    }
}

impl EnrichmentProvider for LocalPorts {
    fn environment<'a>(&'a self, goal: &'a str) -> PortFuture<'a, Value> {
        self.enrichment.environment(goal)
    }

    fn imagery(&self, position: Position) -> PortFuture<'_, Url> {
        self.enrichment.imagery(position)
    }
}

impl MissionReporter for LocalPorts {
    fn report<'a>(&'a self, snapshot: &'a MissionSnapshot) -> PortFuture<'a, MissionReport> {
        self.reporter.report(snapshot)
    }
}

impl ProgressSink for LocalPorts {
    fn publish(&self, update: ProgressUpdate) {
        self.progress.publish(update);
    }
}
