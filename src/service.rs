#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! Launching, scheduling and cancelling missions.

use crate::config::MissionConfig;
use crate::error::{Result, RoverError};
use crate::orchestrator_service::{MissionOutcome, OrchestratorService};
use crate::ports::{bounded, MissionPorts};
use crate::runtime::{fallback_plan, normalize_plan, NormalizedPlan};
use crate::store::MissionStore;
use crate::types::{Mission, MissionId, ObstacleSet, Position};
use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Where a new mission's obstacles come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ObstacleSource {
    #[default]
    Random,
    Seeded(u64),
    Explicit(Vec<Position>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionRequest {
    pub goal: String,
    pub obstacles: ObstacleSource,
}

impl MissionRequest {
    #[must_use]
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            obstacles: ObstacleSource::Random,
        }
    }

    #[must_use]
    pub fn with_obstacles(mut self, obstacles: impl IntoIterator<Item = Position>) -> Self {
        self.obstacles = ObstacleSource::Explicit(obstacles.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.obstacles = ObstacleSource::Seeded(seed);
        self
    }
}

/// A launched mission.
pub struct MissionHandle {
    id: MissionId,
    cancel: CancellationToken,
    task: JoinHandle<Result<MissionOutcome>>,
}

impl MissionHandle {
    #[must_use]
    pub const fn id(&self) -> MissionId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// # Errors
    /// Returns the mission's own error, `RoverError::Cancelled` when the task
    /// was torn down, or `RoverError::Internal` when it panicked.
    pub async fn wait(self) -> Result<MissionOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(RoverError::Cancelled(self.id.to_string())),
            Err(err) => Err(RoverError::Internal(format!(
                "mission {} task failed: {err}",
                self.id
            ))),
        }
    }
}

pub struct MissionService<P> {
    orchestrator: Arc<OrchestratorService<P>>,
    running: Arc<Mutex<HashMap<MissionId, CancellationToken>>>,
}

impl<P> Clone for MissionService<P> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            running: Arc::clone(&self.running),
        }
    }
}

impl<P> MissionService<P>
where
    P: MissionPorts + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(ports: P, config: MissionConfig) -> Self {
        Self::with_store(ports, Arc::new(MissionStore::new()), config)
    }

    #[must_use]
    pub fn with_store(ports: P, store: Arc<MissionStore>, config: MissionConfig) -> Self {
        Self {
            orchestrator: Arc::new(OrchestratorService::new(ports, store, config)),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<MissionStore> {
        self.orchestrator.store()
    }

    #[must_use]
    pub fn config(&self) -> &MissionConfig {
        self.orchestrator.config()
    }

    /// Records a `Pending` mission without starting it.
    pub async fn create(&self, request: &MissionRequest) -> MissionId {
        let config = self.orchestrator.config();
        let grid = config.grid();
        let obstacles = match &request.obstacles {
            ObstacleSource::Explicit(cells) => {
                ObstacleSet::new(cells.iter().copied().filter(|cell| grid.contains(*cell)))
            }
            ObstacleSource::Seeded(seed) => ObstacleSet::random(
                grid,
                config.obstacle_count,
                config.obstacle_attempts,
                &mut StdRng::seed_from_u64(*seed),
            ),
            ObstacleSource::Random => ObstacleSet::random(
                grid,
                config.obstacle_count,
                config.obstacle_attempts,
                &mut rand::thread_rng(),
            ),
        };
        let mission = Mission::new(
            MissionId::new(),
            request.goal.clone(),
            grid,
            obstacles,
            config.rejection_window,
        );
        self.store().create(mission).await
    }

    /// Starts a mission immediately.
    pub async fn spawn(&self, request: &MissionRequest) -> MissionHandle {
        self.launch(request, None).await
    }

    /// Starts a mission after `delay`. Cancelling during the wait skips
    /// straight to an aborted report.
    pub async fn schedule(&self, request: &MissionRequest, delay: Duration) -> MissionHandle {
        self.launch(request, Some(delay)).await
    }

    async fn launch(&self, request: &MissionRequest, delay: Option<Duration>) -> MissionHandle {
        let id = self.create(request).await;
        let cancel = CancellationToken::new();
        self.running.lock().await.insert(id, cancel.clone());

        let orchestrator = Arc::clone(&self.orchestrator);
        let running = Arc::clone(&self.running);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            if let Some(delay) = delay {
                info!(mission_id = %id, ?delay, "mission scheduled");
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = token.cancelled() => {}
                }
            }
            let result = orchestrator.run(id, &token).await;
            running.lock().await.remove(&id);
            result
        });

        MissionHandle { id, cancel, task }
    }

    /// Requests cancellation. Returns false when the mission is not running.
    pub async fn cancel(&self, id: MissionId) -> bool {
        let running = self.running.lock().await;
        match running.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => {
                warn!(mission_id = %id, "cancel requested for a mission that is not running");
                false
            }
        }
    }

    /// Drops a finished mission's record once its report has been handed
    /// out. Returns `None` while the mission is still running.
    pub async fn retire(&self, id: MissionId) -> Option<Mission> {
        let running = self.running.lock().await;
        if running.contains_key(&id) {
            warn!(mission_id = %id, "refusing to retire a running mission");
            return None;
        }
        let mission = self.store().remove(id).await;
        drop(running);
        if mission.is_some() {
            info!(mission_id = %id, "mission retired");
        }
        mission
    }

    pub async fn running(&self) -> Vec<MissionId> {
        self.running.lock().await.keys().copied().collect()
    }

    /// Runs every request concurrently; results keep request order.
    pub async fn run_all(&self, requests: &[MissionRequest]) -> Vec<Result<MissionOutcome>> {
        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            handles.push(self.spawn(request).await);
        }
        join_all(handles.into_iter().map(MissionHandle::wait)).await
    }

    /// The plan a mission with this goal would execute, without creating it.
    pub async fn preview_plan(&self, goal: &str) -> NormalizedPlan {
        let config = self.orchestrator.config();
        let grid = config.grid();
        match bounded(config.oracle_timeout(), self.orchestrator.ports().plan(goal)).await {
            Ok(proposed) => normalize_plan(proposed, goal, grid),
            Err(err) => NormalizedPlan {
                plan: fallback_plan(goal, grid),
                corrections: vec![format!("planning oracle failed ({err}); fallback plan")],
            },
        }
    }
}
