#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod decision;

#[cfg(test)]
mod tests;

pub use decision::{CandidateSource, MoveDecision, SeekMode};

use crate::config::MissionConfig;
use crate::error::{OracleError, Result, RoverError};
use crate::ports::{bounded, AdvisoryRequest, MissionPorts, NavigationAdvice, NavigationRequest};
use crate::report::MissionReport;
use crate::runtime::{
    emergency_return_path, fallback_plan, false_completions, next_move, normalize_plan,
    plausible_candidate, reconcile, step_reached, validate, Admission, AdmissionReason,
    CompletionVerdict, MovementEvent,
};
use crate::store::MissionStore;
use crate::types::{
    AgentKind, AgentStatus, CollectedArtifact, LogLevel, Mission, MissionId, MissionStatus,
    PlannedStep, Position, Step,
};
use chrono::Utc;
use itertools::Itertools;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// How the step loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    RejectionLimit { blocking: usize },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissionOutcome {
    pub mission_id: MissionId,
    pub status: MissionStatus,
    pub report: MissionReport,
}

/// Drives one mission at a time from PLAN to REPORT.
///
/// Every decision re-reads the mission from the store; nothing about step
/// or position state is cached between cycles.
pub struct OrchestratorService<P> {
    ports: P,
    store: Arc<MissionStore>,
    config: MissionConfig,
}

impl<P> OrchestratorService<P>
where
    P: MissionPorts + Send + Sync,
{
    #[must_use]
    pub const fn new(ports: P, store: Arc<MissionStore>, config: MissionConfig) -> Self {
        Self {
            ports,
            store,
            config,
        }
    }

    #[must_use]
    pub const fn ports(&self) -> &P {
        &self.ports
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<MissionStore> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// Runs a stored mission to a terminal status and produces its report.
    ///
    /// Cancellation and rejection aborts both end in `Aborted` and still
    /// report.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when the record disappears and
    /// `RoverError::IterationCapExceeded` when the loop fails to terminate;
    /// in the latter case the mission is left in `Error`.
    pub async fn run(&self, id: MissionId, cancel: &CancellationToken) -> Result<MissionOutcome> {
        info!(mission_id = %id, "mission started");

        let outcome = match self.prepare(id, cancel).await {
            Ok(true) => self.execute(id, cancel).await,
            Ok(false) => Ok(ExecutionOutcome::Cancelled),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(ExecutionOutcome::Completed) => self.finish(id).await?,
            Ok(ExecutionOutcome::RejectionLimit { blocking }) => self.abort(id, blocking).await?,
            Ok(ExecutionOutcome::Cancelled) => self.cancelled(id).await?,
            Err(err @ RoverError::MissionNotFound(_)) => {
                error!(mission_id = %id, "mission record lost: {err}");
                return Err(err);
            }
            Err(err) => {
                self.fail(id, &err).await;
                return Err(err);
            }
        }

        let report = self.report(id).await?;
        Ok(MissionOutcome {
            mission_id: id,
            status: report.status,
            report,
        })
    }

    /// PLAN and FETCH_CONTEXT. Returns false when cancelled on the way.
    async fn prepare(&self, id: MissionId, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Ok(false);
        }

        let mission = self.store.get(id).await?;
        let goal = mission.goal().to_string();
        let grid = mission.grid();

        self.store.set_status(id, MissionStatus::Planning).await?;
        self.store
            .set_agent_status(id, AgentKind::Planner, AgentStatus::Planning)
            .await?;
        self.note(id, AgentKind::Planner, LogLevel::Info, format!("Planning mission: {goal}"))
            .await?;
        self.publish(id).await;

        let plan = match bounded(self.config.oracle_timeout(), self.ports.plan(&goal)).await {
            Ok(proposed) => {
                let normalized = normalize_plan(proposed, &goal, grid);
                for correction in &normalized.corrections {
                    self.note(
                        id,
                        AgentKind::Planner,
                        LogLevel::Warning,
                        format!("Plan corrected: {correction}"),
                    )
                    .await?;
                }
                normalized.plan
            }
            Err(err) => {
                self.note(
                    id,
                    AgentKind::Planner,
                    LogLevel::Warning,
                    format!("Planning oracle failed ({err}); using fallback plan"),
                )
                .await?;
                fallback_plan(&goal, grid)
            }
        };

        let outline = plan
            .iter()
            .map(|step| match step.target() {
                Some(target) => format!("{} {target}", step.kind()),
                None => step.kind().to_string(),
            })
            .join(" -> ");
        let step_count = plan.len();
        self.store.set_steps(id, plan).await?;
        self.store
            .set_agent_status(id, AgentKind::Planner, AgentStatus::Complete)
            .await?;
        self.note(
            id,
            AgentKind::Planner,
            LogLevel::Info,
            format!("Plan ready with {step_count} steps: {outline}"),
        )
        .await?;
        self.publish(id).await;

        if cancel.is_cancelled() {
            return Ok(false);
        }

        match bounded(self.config.oracle_timeout(), self.ports.environment(&goal)).await {
            Ok(environment) => {
                self.store.set_environment(id, environment).await?;
                self.note(id, AgentKind::System, LogLevel::Info, "Environment context attached")
                    .await?;
            }
            Err(err) => {
                self.note(
                    id,
                    AgentKind::System,
                    LogLevel::Warning,
                    format!("Environment context unavailable: {err}"),
                )
                .await?;
            }
        }

        if cancel.is_cancelled() {
            return Ok(false);
        }

        self.store.set_status(id, MissionStatus::Executing).await?;
        self.store
            .set_agent_status(id, AgentKind::Rover, AgentStatus::Executing)
            .await?;
        self.publish(id).await;
        Ok(true)
    }

    /// The SEEK -> VALIDATE -> APPLY loop, resumable from whatever the store
    /// currently holds.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when the record disappears and
    /// `RoverError::IterationCapExceeded` when the cycle budget runs out.
    pub async fn execute(
        &self,
        id: MissionId,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        let step_count = self.store.get(id).await?.plan().len();
        let cap = self.config.iteration_cap(step_count);
        let threshold = self.config.rejection_threshold;
        let mut mode = SeekMode::Consult;
        let mut iterations = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Ok(ExecutionOutcome::Cancelled);
            }
            iterations += 1;
            if iterations > cap {
                return Err(RoverError::IterationCapExceeded {
                    mission_id: id.to_string(),
                    cap,
                });
            }

            let mission = self.store.get(id).await?;
            let offset = mission.current_step_index();

            let Some(step) = mission.step(offset) else {
                match reconcile(&mission) {
                    CompletionVerdict::Complete => return Ok(ExecutionOutcome::Completed),
                    CompletionVerdict::FalseCompletions { .. } => {
                        self.reopen_false_completions(id).await?;
                    }
                    CompletionVerdict::Incomplete { resume_at } => {
                        self.store.set_current_step(id, resume_at).await?;
                        self.note(
                            id,
                            AgentKind::Supervisor,
                            LogLevel::Info,
                            format!("Resuming at step {}", resume_at + 1),
                        )
                        .await?;
                    }
                }
                mode = SeekMode::Consult;
                continue;
            };

            if step.completed {
                self.store.set_current_step(id, offset + 1).await?;
                continue;
            }

            let position = mission.rover_position();
            let target = match step.target {
                Some(target) if target != position => target,
                _ => {
                    self.complete_in_place(id, &mission, &step, offset).await?;
                    mode = SeekMode::Consult;
                    continue;
                }
            };

            // SEEK
            let decision = self.decide(&mission, &step, target, mode).await?;
            if cancel.is_cancelled() {
                return Ok(ExecutionOutcome::Cancelled);
            }

            // stall guard: a no-op while off target never reaches APPLY
            if decision.candidate == position {
                let blocking = self.store.record_event(id, MovementEvent::Stalled).await?;
                self.note(
                    id,
                    AgentKind::Rover,
                    LogLevel::Warning,
                    format!(
                        "Stalled at {position} on step {} toward {target} ({blocking}/{threshold})",
                        step.index
                    ),
                )
                .await?;
                self.publish(id).await;
                if blocking >= threshold {
                    return Ok(ExecutionOutcome::RejectionLimit { blocking });
                }
                mode = SeekMode::Recover { hint: None };
                continue;
            }

            // VALIDATE
            self.store
                .set_agent_status(id, AgentKind::Safety, AgentStatus::Validating)
                .await?;
            let (admission, hint) = self.validate_move(&mission, decision.candidate).await;
            self.store
                .set_agent_status(id, AgentKind::Safety, AgentStatus::Idle)
                .await?;

            if !admission.is_approved() {
                let blocking = self
                    .store
                    .record_event(id, rejection_event(&admission))
                    .await?;
                self.note(
                    id,
                    AgentKind::Safety,
                    LogLevel::Warning,
                    format!(
                        "Rejected {} move to {}: {} (risk {}, {blocking}/{threshold})",
                        decision.source.as_str(),
                        decision.candidate,
                        admission.detail(),
                        admission.risk()
                    ),
                )
                .await?;
                self.publish(id).await;
                if blocking >= threshold {
                    return Ok(ExecutionOutcome::RejectionLimit { blocking });
                }
                mode = SeekMode::Recover { hint };
                continue;
            }

            if cancel.is_cancelled() {
                return Ok(ExecutionOutcome::Cancelled);
            }

            // APPLY
            let blocking = self
                .apply_move(id, &mission, &step, offset, target, decision)
                .await?;
            if blocking >= threshold {
                return Ok(ExecutionOutcome::RejectionLimit { blocking });
            }
            mode = SeekMode::Consult;
        }
    }

    async fn decide(
        &self,
        mission: &Mission,
        step: &Step,
        target: Position,
        mode: SeekMode,
    ) -> Result<MoveDecision> {
        let position = mission.rover_position();
        let resolve = || {
            next_move(
                position,
                target,
                mission.obstacles(),
                mission.grid(),
                self.config.detour_slack,
            )
        };

        match mode {
            SeekMode::Recover { hint: Some(alternative) }
                if plausible_candidate(position, target, alternative) =>
            {
                Ok(MoveDecision {
                    candidate: alternative,
                    source: CandidateSource::Advisory,
                    advice: None,
                })
            }
            SeekMode::Recover { .. } => Ok(MoveDecision::resolved(resolve(), None)),
            SeekMode::Consult => match self.consult(mission, step).await {
                Ok(advice) => match advice.candidate {
                    Some(candidate) if plausible_candidate(position, target, candidate) => {
                        Ok(MoveDecision {
                            candidate,
                            source: CandidateSource::Navigator,
                            advice: Some(advice),
                        })
                    }
                    Some(candidate) => {
                        debug!(
                            mission_id = %mission.id(),
                            %candidate,
                            "navigator suggestion discarded as implausible"
                        );
                        Ok(MoveDecision::resolved(resolve(), Some(advice)))
                    }
                    None => Ok(MoveDecision::resolved(resolve(), Some(advice))),
                },
                Err(err) => {
                    self.note(
                        mission.id(),
                        AgentKind::Rover,
                        LogLevel::Warning,
                        format!("Navigation oracle failed ({err}); using path resolver"),
                    )
                    .await?;
                    Ok(MoveDecision::resolved(resolve(), None))
                }
            },
        }
    }

    async fn consult(
        &self,
        mission: &Mission,
        step: &Step,
    ) -> std::result::Result<NavigationAdvice, OracleError> {
        let request = NavigationRequest {
            step: step.clone(),
            position: mission.rover_position(),
            obstacles: mission.obstacles().clone(),
            goal: mission.goal().to_string(),
        };
        bounded(self.config.oracle_timeout(), self.ports.advise(&request)).await
    }

    /// Deterministic check first; the advisory oracle may only tighten it.
    /// Returns the verdict and any alternative the advisory proposed.
    async fn validate_move(
        &self,
        mission: &Mission,
        candidate: Position,
    ) -> (Admission, Option<Position>) {
        let current = mission.rover_position();
        let admission = validate(current, candidate, mission.obstacles(), mission.grid());
        if !admission.is_approved() {
            return (admission, None);
        }

        let request = AdvisoryRequest {
            current,
            proposed: candidate,
            obstacles: mission.obstacles().clone(),
            environment: mission.environment().cloned(),
        };
        match bounded(self.config.oracle_timeout(), self.ports.review(&request)).await {
            Ok(verdict) => {
                let hint = (!verdict.approved).then_some(verdict.alternative).flatten();
                (
                    admission.tighten(verdict.approved, &verdict.reason, verdict.risk),
                    hint,
                )
            }
            Err(err) => {
                debug!(
                    mission_id = %mission.id(),
                    error = %err,
                    "advisory oracle unavailable; deterministic verdict stands"
                );
                (admission, None)
            }
        }
    }

    /// Writes an admitted move and evaluates step completion. Returns the
    /// blocking count after recording the move.
    async fn apply_move(
        &self,
        id: MissionId,
        mission: &Mission,
        step: &Step,
        offset: usize,
        target: Position,
        decision: MoveDecision,
    ) -> Result<usize> {
        let position = mission.rover_position();
        let candidate = decision.candidate;
        let event = if mission.visited_this_step(candidate) {
            MovementEvent::Revisited
        } else if candidate.manhattan(target) < position.manhattan(target) {
            MovementEvent::Advanced
        } else {
            MovementEvent::Detoured
        };

        self.store.update_position(id, candidate).await?;
        let blocking = self.store.record_event(id, event).await?;
        self.note(
            id,
            AgentKind::Rover,
            if event.is_blocking() {
                LogLevel::Warning
            } else {
                LogLevel::Info
            },
            format!(
                "Moved {position} -> {candidate} via {} ({})",
                decision.source.as_str(),
                event.as_str()
            ),
        )
        .await?;

        let reached = mission
            .planned_step(offset)
            .is_some_and(|planned| step_reached(planned, candidate));
        if reached {
            let wants_image = decision.requests_attachment();
            let findings = decision.advice.and_then(|advice| advice.findings);
            self.finish_step(id, step, offset, candidate, findings, wants_image)
                .await?;
        }

        self.publish(id).await;
        Ok(if event.is_blocking() { blocking } else { 0 })
    }

    /// Completes a step that needs no movement: targetless steps and steps
    /// whose target the rover already occupies.
    async fn complete_in_place(
        &self,
        id: MissionId,
        mission: &Mission,
        step: &Step,
        offset: usize,
    ) -> Result<()> {
        let position = mission.rover_position();
        let needs_findings = step.target.is_none() || step.kind.surveys();
        let advice = if needs_findings {
            match self.consult(mission, step).await {
                Ok(advice) => Some(advice),
                Err(err) => {
                    self.note(
                        id,
                        AgentKind::Rover,
                        LogLevel::Warning,
                        format!("No findings for step {} ({err})", step.index),
                    )
                    .await?;
                    None
                }
            }
        } else {
            None
        };

        let wants_image = advice.as_ref().is_some_and(|a| a.request_attachment);
        let findings = advice.and_then(|a| a.findings);
        self.finish_step(id, step, offset, position, findings, wants_image)
            .await?;
        self.publish(id).await;
        Ok(())
    }

    async fn finish_step(
        &self,
        id: MissionId,
        step: &Step,
        offset: usize,
        position: Position,
        findings: Option<String>,
        wants_image: bool,
    ) -> Result<()> {
        let attachment = if wants_image {
            self.fetch_imagery(id, position).await?
        } else {
            None
        };

        self.store
            .update_step(id, offset, true, attachment.clone())
            .await?;
        if let Some(url) = attachment {
            self.store.add_attachment(id, url).await?;
        }
        if let Some(findings) = findings.filter(|text| !text.trim().is_empty()) {
            self.store
                .append_artifact(
                    id,
                    CollectedArtifact {
                        step_index: step.index,
                        kind: step.kind,
                        position,
                        findings,
                        timestamp: Utc::now(),
                    },
                )
                .await?;
        }
        self.note(
            id,
            AgentKind::Rover,
            LogLevel::Success,
            format!("Step {} ({}) complete at {position}", step.index, step.kind),
        )
        .await?;
        self.store.set_current_step(id, offset + 1).await
    }

    async fn fetch_imagery(&self, id: MissionId, position: Position) -> Result<Option<Url>> {
        match bounded(self.config.oracle_timeout(), self.ports.imagery(position)).await {
            Ok(url) => Ok(Some(url)),
            Err(err) => {
                debug!(mission_id = %id, error = %err, "imagery unavailable");
                Ok(None)
            }
        }
    }

    /// Unmarks every falsely completed step under one write lock and resumes
    /// at the earliest.
    async fn reopen_false_completions(&self, id: MissionId) -> Result<()> {
        let reopened: Vec<(PlannedStep, Option<Position>)> = self
            .store
            .transact(id, |mission| {
                let offsets = false_completions(mission);
                let details = offsets
                    .iter()
                    .filter_map(|offset| {
                        let planned = mission.planned_step(*offset)?.clone();
                        let witness = mission.step_progress(*offset)?.completed_at;
                        Some((planned, witness))
                    })
                    .collect();
                for offset in &offsets {
                    mission.mark_step(*offset, false, None);
                }
                if let Some(earliest) = offsets.iter().min() {
                    mission.set_current_step(*earliest);
                }
                details
            })
            .await?;

        let live = self.store.get(id).await?.rover_position();
        for (planned, witness) in reopened {
            let target = planned.target().map_or_else(|| "none".to_string(), |t| t.to_string());
            let witness = witness.map_or_else(|| "none".to_string(), |w| w.to_string());
            self.note(
                id,
                AgentKind::Supervisor,
                LogLevel::Warning,
                format!(
                    "False completion: step {} targets {target} but was marked at {witness} (rover at {live}); reopening",
                    planned.index()
                ),
            )
            .await?;
        }
        self.publish(id).await;
        Ok(())
    }

    async fn finish(&self, id: MissionId) -> Result<()> {
        self.store.set_status(id, MissionStatus::Complete).await?;
        self.store
            .set_agent_status(id, AgentKind::Rover, AgentStatus::Complete)
            .await?;
        let position = self.store.get(id).await?.rover_position();
        self.note(
            id,
            AgentKind::System,
            LogLevel::Success,
            format!("Mission complete; rover at {position}"),
        )
        .await?;
        self.publish(id).await;
        Ok(())
    }

    /// ABORT: obstacle-blind walk back to the origin, then `Aborted`.
    async fn abort(&self, id: MissionId, blocking: usize) -> Result<()> {
        self.store
            .set_agent_status(id, AgentKind::Supervisor, AgentStatus::Executing)
            .await?;
        self.note(
            id,
            AgentKind::Supervisor,
            LogLevel::Error,
            format!(
                "Rejection threshold reached ({blocking} blocking events in the last {}); starting emergency return",
                self.config.rejection_window
            ),
        )
        .await?;

        let from = self.store.get(id).await?.rover_position();
        for cell in emergency_return_path(from) {
            self.store.update_position(id, cell).await?;
            self.note(
                id,
                AgentKind::Rover,
                LogLevel::Warning,
                format!("Emergency return: {cell}"),
            )
            .await?;
            self.publish(id).await;
        }

        self.store.set_status(id, MissionStatus::Aborted).await?;
        self.store
            .set_agent_status(id, AgentKind::Rover, AgentStatus::Error)
            .await?;
        self.store
            .set_agent_status(id, AgentKind::Supervisor, AgentStatus::Complete)
            .await?;
        self.note(
            id,
            AgentKind::System,
            LogLevel::Error,
            "Mission aborted; rover returned to base",
        )
        .await?;
        self.publish(id).await;
        Ok(())
    }

    async fn cancelled(&self, id: MissionId) -> Result<()> {
        self.store.set_status(id, MissionStatus::Aborted).await?;
        self.store
            .set_agent_status(id, AgentKind::Rover, AgentStatus::Idle)
            .await?;
        let position = self.store.get(id).await?.rover_position();
        self.note(
            id,
            AgentKind::System,
            LogLevel::Warning,
            format!("Mission cancelled; rover holding at {position}"),
        )
        .await?;
        self.publish(id).await;
        Ok(())
    }

    /// Best effort: the record may be the thing that failed.
    async fn fail(&self, id: MissionId, err: &RoverError) {
        error!(mission_id = %id, code = err.code(), "mission failed: {err}");
        let marked = async {
            self.store.set_status(id, MissionStatus::Error).await?;
            self.store
                .set_agent_status(id, AgentKind::Supervisor, AgentStatus::Error)
                .await?;
            self.store
                .append_log(id, AgentKind::System, LogLevel::Error, format!("Mission failed: {err}"))
                .await
        };
        if let Err(mark_err) = marked.await {
            warn!(mission_id = %id, "could not record failure: {mark_err}");
        }
        self.publish(id).await;
    }

    async fn report(&self, id: MissionId) -> Result<MissionReport> {
        self.store
            .set_agent_status(id, AgentKind::Reporter, AgentStatus::Reporting)
            .await?;
        self.publish(id).await;

        let snapshot = self.store.snapshot(id).await?;
        let report = match bounded(self.config.oracle_timeout(), self.ports.report(&snapshot)).await
        {
            Ok(report) => report,
            Err(err) => {
                self.note(
                    id,
                    AgentKind::Reporter,
                    LogLevel::Warning,
                    format!("Reporter unavailable ({err}); using built-in summary"),
                )
                .await?;
                MissionReport::from_snapshot(&snapshot)
            }
        };

        self.store
            .set_agent_status(id, AgentKind::Reporter, AgentStatus::Complete)
            .await?;
        self.note(id, AgentKind::Reporter, LogLevel::Info, report.summary.clone())
            .await?;
        self.publish(id).await;
        info!(mission_id = %id, status = %report.status, "mission finished");
        Ok(report)
    }

    async fn note(
        &self,
        id: MissionId,
        source: AgentKind,
        level: LogLevel,
        message: impl Into<String> + Send,
    ) -> Result<()> {
        let message = message.into();
        match level {
            LogLevel::Error => error!(mission_id = %id, %source, "{message}"),
            LogLevel::Warning => warn!(mission_id = %id, %source, "{message}"),
            LogLevel::Info | LogLevel::Success => info!(mission_id = %id, %source, "{message}"),
        }
        self.store.append_log(id, source, level, message).await
    }

    async fn publish(&self, id: MissionId) {
        if let Ok(update) = self.store.progress(id, self.config.progress_log_tail).await {
            self.ports.publish(update);
        }
    }
}

const fn rejection_event(admission: &Admission) -> MovementEvent {
    match admission.reason() {
        AdmissionReason::OutOfBounds => MovementEvent::OutOfBoundsRejected,
        AdmissionReason::Obstacle => MovementEvent::ObstacleRejected,
        AdmissionReason::AdvisoryRejected | AdmissionReason::Clear => {
            MovementEvent::AdvisoryRejected
        }
    }
}
