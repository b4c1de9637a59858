#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use super::grid::{Grid, ObstacleSet, Position};
use super::identifiers::MissionId;
use super::status::{AgentKind, AgentStatus, LogLevel, MissionStatus};
use super::step::{MissionPlan, PlannedStep, Step, StepKind, StepProgress};
use crate::runtime::rejection::{MovementEvent, RejectionWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub mission_id: MissionId,
    pub timestamp: DateTime<Utc>,
    pub source: AgentKind,
    pub message: String,
    pub level: LogLevel,
}

/// Findings recorded when a step completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedArtifact {
    pub step_index: usize,
    pub kind: StepKind,
    pub position: Position,
    pub findings: String,
    pub timestamp: DateTime<Utc>,
}

/// Authoritative record of one mission. Owned by the mission store.
#[derive(Debug, Clone)]
pub struct Mission {
    id: MissionId,
    goal: String,
    status: MissionStatus,
    grid: Grid,
    rover_position: Position,
    obstacles: ObstacleSet,
    plan: MissionPlan,
    progress: Vec<StepProgress>,
    current_step_index: usize,
    logs: Vec<LogEntry>,
    artifacts: Vec<CollectedArtifact>,
    agent_states: BTreeMap<AgentKind, AgentStatus>,
    environment: Option<Value>,
    attachments: Vec<Url>,
    goal_positions: Vec<Position>,
    step_trail: Vec<Position>,
    rejections: RejectionWindow,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Mission {
    #[must_use]
    pub fn new(
        id: MissionId,
        goal: impl Into<String>,
        grid: Grid,
        obstacles: ObstacleSet,
        rejection_window: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            goal: goal.into(),
            status: MissionStatus::Pending,
            grid,
            rover_position: Position::ORIGIN,
            obstacles,
            plan: MissionPlan::default(),
            progress: Vec::new(),
            current_step_index: 0,
            logs: Vec::new(),
            artifacts: Vec::new(),
            agent_states: AgentKind::TRACKED
                .iter()
                .map(|kind| (*kind, AgentStatus::Idle))
                .collect(),
            environment: None,
            attachments: Vec::new(),
            goal_positions: Vec::new(),
            step_trail: vec![Position::ORIGIN],
            rejections: RejectionWindow::new(rejection_window),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub const fn id(&self) -> MissionId {
        self.id
    }

    #[must_use]
    pub fn goal(&self) -> &str {
        &self.goal
    }

    #[must_use]
    pub const fn status(&self) -> MissionStatus {
        self.status
    }

    #[must_use]
    pub const fn grid(&self) -> Grid {
        self.grid
    }

    #[must_use]
    pub const fn rover_position(&self) -> Position {
        self.rover_position
    }

    #[must_use]
    pub const fn obstacles(&self) -> &ObstacleSet {
        &self.obstacles
    }

    #[must_use]
    pub const fn plan(&self) -> &MissionPlan {
        &self.plan
    }

    /// Zero-based offset of the step being worked; equals the step count
    /// once every step has been advanced past.
    #[must_use]
    pub const fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    #[must_use]
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    #[must_use]
    pub fn artifacts(&self) -> &[CollectedArtifact] {
        &self.artifacts
    }

    #[must_use]
    pub const fn agent_states(&self) -> &BTreeMap<AgentKind, AgentStatus> {
        &self.agent_states
    }

    #[must_use]
    pub const fn environment(&self) -> Option<&Value> {
        self.environment.as_ref()
    }

    #[must_use]
    pub fn attachments(&self) -> &[Url] {
        &self.attachments
    }

    #[must_use]
    pub fn goal_positions(&self) -> &[Position] {
        &self.goal_positions
    }

    /// Cells occupied since the current step became active.
    #[must_use]
    pub fn step_trail(&self) -> &[Position] {
        &self.step_trail
    }

    #[must_use]
    pub const fn rejection_window(&self) -> &RejectionWindow {
        &self.rejections
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn planned_step(&self, offset: usize) -> Option<&PlannedStep> {
        self.plan.get(offset)
    }

    #[must_use]
    pub fn step_progress(&self, offset: usize) -> Option<&StepProgress> {
        self.progress.get(offset)
    }

    #[must_use]
    pub fn step(&self, offset: usize) -> Option<Step> {
        self.plan
            .get(offset)
            .zip(self.progress.get(offset))
            .map(|(planned, progress)| Step::from_parts(planned, progress))
    }

    #[must_use]
    pub fn steps(&self) -> Vec<Step> {
        self.plan
            .iter()
            .zip(self.progress.iter())
            .map(|(planned, progress)| Step::from_parts(planned, progress))
            .collect()
    }

    #[must_use]
    pub fn completed_steps(&self) -> usize {
        self.progress.iter().filter(|p| p.completed).count()
    }

    #[must_use]
    pub fn all_steps_complete(&self) -> bool {
        self.progress.iter().all(|p| p.completed)
    }

    /// Whether the rover has stood on `position` since the current step began.
    #[must_use]
    pub fn visited_this_step(&self, position: Position) -> bool {
        self.step_trail.contains(&position)
    }

    #[must_use]
    pub fn snapshot(&self) -> MissionSnapshot {
        MissionSnapshot {
            id: self.id,
            goal: self.goal.clone(),
            status: self.status,
            rover_position: self.rover_position,
            obstacles: self.obstacles.clone(),
            steps: self.steps(),
            current_step_index: self.current_step_index,
            logs: self.logs.clone(),
            artifacts: self.artifacts.clone(),
            agent_states: self.agent_states.clone(),
            environment: self.environment.clone(),
            attachments: self.attachments.clone(),
            goal_positions: self.goal_positions.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[must_use]
    pub fn summary(&self) -> MissionSummary {
        MissionSummary {
            mission_id: self.id,
            goal: self.goal.clone(),
            status: self.status,
            rover_position: self.rover_position,
            total_steps: self.plan.len(),
            completed_steps: self.completed_steps(),
            current_step_index: self.current_step_index,
            log_count: self.logs.len(),
            artifact_count: self.artifacts.len(),
            attachment_count: self.attachments.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[must_use]
    pub fn progress_update(&self, log_tail: usize) -> ProgressUpdate {
        let skip = self.logs.len().saturating_sub(log_tail);
        ProgressUpdate {
            mission_id: self.id,
            rover_position: self.rover_position,
            current_step_index: self.current_step_index,
            total_steps: self.plan.len(),
            status: self.status,
            agent_states: self.agent_states.clone(),
            recent_logs: self.logs.iter().skip(skip).cloned().collect(),
        }
    }

    pub(crate) fn replace_plan(&mut self, plan: MissionPlan) {
        self.progress = vec![StepProgress::default(); plan.len()];
        self.goal_positions = plan.goal_positions();
        self.plan = plan;
        self.current_step_index = 0;
        self.step_trail = vec![self.rover_position];
        self.touch();
    }

    /// Returns the previous position.
    pub(crate) fn move_rover(&mut self, position: Position) -> Position {
        let previous = self.rover_position;
        self.rover_position = position;
        self.step_trail.push(position);
        self.touch();
        previous
    }

    /// Flips a step's completion flag. Completing stamps the live rover
    /// position as witness; un-completing clears it.
    pub(crate) fn mark_step(
        &mut self,
        offset: usize,
        completed: bool,
        attachment: Option<Url>,
    ) -> bool {
        let witness = self.rover_position;
        let Some(progress) = self.progress.get_mut(offset) else {
            return false;
        };
        progress.completed = completed;
        progress.completed_at = completed.then_some(witness);
        if attachment.is_some() {
            progress.attachment = attachment;
        }
        self.touch();
        true
    }

    pub(crate) fn set_current_step(&mut self, offset: usize) {
        if offset != self.current_step_index {
            self.step_trail = vec![self.rover_position];
        }
        self.current_step_index = offset.min(self.plan.len());
        self.touch();
    }

    pub(crate) fn push_log(&mut self, source: AgentKind, level: LogLevel, message: String) {
        self.logs.push(LogEntry {
            mission_id: self.id,
            timestamp: Utc::now(),
            source,
            message,
            level,
        });
        self.touch();
    }

    pub(crate) fn push_artifact(&mut self, artifact: CollectedArtifact) {
        self.artifacts.push(artifact);
        self.touch();
    }

    /// Applies a lifecycle transition; returns false when it is not allowed.
    pub(crate) fn transition(&mut self, next: MissionStatus) -> bool {
        if self.status == next {
            return true;
        }
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.touch();
        true
    }

    pub(crate) fn set_agent_status(&mut self, agent: AgentKind, status: AgentStatus) {
        self.agent_states.insert(agent, status);
        self.touch();
    }

    pub(crate) fn set_environment(&mut self, environment: Value) {
        self.environment = Some(environment);
        self.touch();
    }

    /// Returns false when the URL was already attached.
    pub(crate) fn add_attachment(&mut self, url: Url) -> bool {
        if self.attachments.contains(&url) {
            return false;
        }
        self.attachments.push(url);
        self.touch();
        true
    }

    pub(crate) fn record_event(&mut self, event: MovementEvent) -> usize {
        let count = self.rejections.record(event);
        self.touch();
        count
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Serializable copy of a mission handed to reporters and observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub id: MissionId,
    pub goal: String,
    pub status: MissionStatus,
    pub rover_position: Position,
    pub obstacles: ObstacleSet,
    pub steps: Vec<Step>,
    pub current_step_index: usize,
    pub logs: Vec<LogEntry>,
    pub artifacts: Vec<CollectedArtifact>,
    pub agent_states: BTreeMap<AgentKind, AgentStatus>,
    pub environment: Option<Value>,
    pub attachments: Vec<Url>,
    pub goal_positions: Vec<Position>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionSummary {
    pub mission_id: MissionId,
    pub goal: String,
    pub status: MissionStatus,
    pub rover_position: Position,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub current_step_index: usize,
    pub log_count: usize,
    pub artifact_count: usize,
    pub attachment_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Observational snapshot published after every state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub mission_id: MissionId,
    pub rover_position: Position,
    pub current_step_index: usize,
    pub total_steps: usize,
    pub status: MissionStatus,
    pub agent_states: BTreeMap<AgentKind, AgentStatus>,
    pub recent_logs: Vec<LogEntry>,
}
