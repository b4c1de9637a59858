#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::error::{Result, RoverError};
use crate::runtime::MovementEvent;
use crate::types::{
    AgentKind, AgentStatus, CollectedArtifact, LogLevel, Mission, MissionId, MissionPlan,
    MissionSnapshot, MissionStatus, MissionSummary, Position, ProgressUpdate,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

type MissionSlot = Arc<RwLock<Mission>>;

/// In-process ledger of mission records.
///
/// The outer map lock is held only to look up or insert a slot; every
/// read or mutation of a mission goes through that mission's own lock, so
/// distinct missions never contend.
#[derive(Default)]
pub struct MissionStore {
    missions: RwLock<HashMap<MissionId, MissionSlot>>,
}

impl MissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, mission: Mission) -> MissionId {
        let id = mission.id();
        self.missions
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(mission)));
        debug!(mission_id = %id, "mission record created");
        id
    }

    async fn slot(&self, id: MissionId) -> Result<MissionSlot> {
        self.missions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RoverError::MissionNotFound(id.to_string()))
    }

    async fn read<T>(&self, id: MissionId, f: impl FnOnce(&Mission) -> T) -> Result<T> {
        let slot = self.slot(id).await?;
        let guard = slot.read().await;
        Ok(f(&guard))
    }

    /// Runs `f` under the mission's write lock. Observers never see a
    /// partially applied change.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn transact<T>(&self, id: MissionId, f: impl FnOnce(&mut Mission) -> T) -> Result<T> {
        let slot = self.slot(id).await?;
        let mut guard = slot.write().await;
        Ok(f(&mut guard))
    }

    /// Consistent copy of the whole record.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn get(&self, id: MissionId) -> Result<Mission> {
        self.read(id, Clone::clone).await
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn snapshot(&self, id: MissionId) -> Result<MissionSnapshot> {
        self.read(id, Mission::snapshot).await
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn summary(&self, id: MissionId) -> Result<MissionSummary> {
        self.read(id, Mission::summary).await
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn progress(&self, id: MissionId, log_tail: usize) -> Result<ProgressUpdate> {
        self.read(id, |mission| mission.progress_update(log_tail))
            .await
    }

    /// Replaces the plan and resets all step progress.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn set_steps(&self, id: MissionId, plan: MissionPlan) -> Result<()> {
        self.transact(id, |mission| mission.replace_plan(plan))
            .await
    }

    /// Returns the previous position.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn update_position(&self, id: MissionId, position: Position) -> Result<Position> {
        self.transact(id, |mission| mission.move_rover(position))
            .await
    }

    /// Flips one step's completion flag and optionally attaches a URL.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists and
    /// `RoverError::InvalidPlan` when the offset is outside the plan.
    pub async fn update_step(
        &self,
        id: MissionId,
        offset: usize,
        completed: bool,
        attachment: Option<Url>,
    ) -> Result<()> {
        let applied = self
            .transact(id, |mission| mission.mark_step(offset, completed, attachment))
            .await?;
        if applied {
            Ok(())
        } else {
            Err(RoverError::InvalidPlan(format!(
                "step offset {offset} is outside the plan of mission {id}"
            )))
        }
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn set_current_step(&self, id: MissionId, offset: usize) -> Result<()> {
        self.transact(id, |mission| mission.set_current_step(offset))
            .await
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn append_log(
        &self,
        id: MissionId,
        source: AgentKind,
        level: LogLevel,
        message: impl Into<String> + Send,
    ) -> Result<()> {
        let message = message.into();
        self.transact(id, |mission| mission.push_log(source, level, message))
            .await
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn append_artifact(&self, id: MissionId, artifact: CollectedArtifact) -> Result<()> {
        self.transact(id, |mission| mission.push_artifact(artifact))
            .await
    }

    /// Applies a status transition. Returns false when the record is already
    /// terminal or the transition is not part of the lifecycle.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn set_status(&self, id: MissionId, status: MissionStatus) -> Result<bool> {
        let applied = self
            .transact(id, |mission| mission.transition(status))
            .await?;
        if !applied {
            debug!(mission_id = %id, to = %status, "status transition ignored");
        }
        Ok(applied)
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn set_agent_status(
        &self,
        id: MissionId,
        agent: AgentKind,
        status: AgentStatus,
    ) -> Result<()> {
        self.transact(id, |mission| mission.set_agent_status(agent, status))
            .await
    }

    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn set_environment(&self, id: MissionId, environment: Value) -> Result<()> {
        self.transact(id, |mission| mission.set_environment(environment))
            .await
    }

    /// Returns false when the URL was already attached.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn add_attachment(&self, id: MissionId, url: Url) -> Result<bool> {
        self.transact(id, |mission| mission.add_attachment(url))
            .await
    }

    /// Records a movement event and returns the blocking count in the window.
    ///
    /// # Errors
    /// Returns `RoverError::MissionNotFound` when no record exists.
    pub async fn record_event(&self, id: MissionId, event: MovementEvent) -> Result<usize> {
        self.transact(id, |mission| mission.record_event(event))
            .await
    }

    /// Drops the record and returns its final state.
    pub async fn remove(&self, id: MissionId) -> Option<Mission> {
        let slot = self.missions.write().await.remove(&id)?;
        let mission = slot.read().await.clone();
        Some(mission)
    }

    pub async fn len(&self) -> usize {
        self.missions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.missions.read().await.is_empty()
    }
}
