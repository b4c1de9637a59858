#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use super::{ExecutionOutcome, OrchestratorService};
use crate::config::MissionConfig;
use crate::error::{OracleError, RoverError};
use crate::ports::{
    AdvisoryOracle, AdvisoryRequest, AdvisoryVerdict, EnrichmentProvider, MissionPorts,
    MissionReporter, NavigationAdvice, NavigationOracle, NavigationRequest, PlanningOracle,
    PortFuture, ProgressSink,
};
use crate::report::MissionReport;
use crate::runtime::{ProposedStep, RiskLevel};
use crate::store::MissionStore;
use crate::types::{
    AgentKind, AgentStatus, Grid, LogLevel, Mission, MissionId, MissionPlan, MissionSnapshot,
    MissionStatus, ObstacleSet, PlannedStep, Position, ProgressUpdate, StepKind,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Rejects a proposed move when every populated field matches.
#[derive(Debug, Clone, Copy)]
struct Veto {
    from: Option<Position>,
    to: Option<Position>,
    alternative: Option<Position>,
}

#[derive(Debug, Clone)]
struct FakePorts {
    plan: Arc<Mutex<Option<Vec<ProposedStep>>>>,
    plan_delay: Arc<Mutex<Option<Duration>>>,
    candidate: Arc<Mutex<Option<Position>>>,
    request_attachment: Arc<Mutex<bool>>,
    veto: Arc<Mutex<Option<Veto>>>,
    environment: Arc<Mutex<Option<Value>>>,
    imagery: Arc<Mutex<Option<Url>>>,
    reporter_fails: Arc<Mutex<bool>>,
    advice_calls: Arc<Mutex<u32>>,
    published: Arc<std::sync::Mutex<Vec<ProgressUpdate>>>,
    cancel_after: Arc<std::sync::Mutex<Option<(usize, CancellationToken)>>>,
}

impl FakePorts {
    fn new() -> Self {
        Self {
            plan: Arc::new(Mutex::new(None)),
            plan_delay: Arc::new(Mutex::new(None)),
            candidate: Arc::new(Mutex::new(None)),
            request_attachment: Arc::new(Mutex::new(false)),
            veto: Arc::new(Mutex::new(None)),
            environment: Arc::new(Mutex::new(None)),
            imagery: Arc::new(Mutex::new(None)),
            reporter_fails: Arc::new(Mutex::new(false)),
            advice_calls: Arc::new(Mutex::new(0)),
            published: Arc::new(std::sync::Mutex::new(Vec::new())),
            cancel_after: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    fn planning(target: Position) -> Self {
        Self::new().with_plan_now(vec![
            ProposedStep::new("move", Some(target), format!("Navigate to {target}")),
            ProposedStep::new("return", Some(Position::ORIGIN), "Return to base"),
        ])
    }

    fn with_plan_now(self, steps: Vec<ProposedStep>) -> Self {
        *self.plan.try_lock().unwrap() = Some(steps);
        self
    }

    async fn with_plan_delay(self, delay: Duration) -> Self {
        let mut current = self.plan_delay.lock().await;
        *current = Some(delay);
        drop(current);
        self
    }

    async fn with_candidate(self, candidate: Position) -> Self {
        let mut current = self.candidate.lock().await;
        *current = Some(candidate);
        drop(current);
        self
    }

    async fn with_imagery(self, url: &str) -> Self {
        let mut current = self.imagery.lock().await;
        *current = Some(Url::parse(url).unwrap());
        drop(current);
        let mut wants = self.request_attachment.lock().await;
        *wants = true;
        drop(wants);
        self
    }

    async fn with_veto(self, veto: Veto) -> Self {
        let mut current = self.veto.lock().await;
        *current = Some(veto);
        drop(current);
        self
    }

    async fn with_environment(self, environment: Value) -> Self {
        let mut current = self.environment.lock().await;
        *current = Some(environment);
        drop(current);
        self
    }

    async fn with_reporter_failure(self) -> Self {
        let mut current = self.reporter_fails.lock().await;
        *current = true;
        drop(current);
        self
    }

    fn cancelling_after(self, publishes: usize, token: CancellationToken) -> Self {
        *self.cancel_after.lock().unwrap() = Some((publishes, token));
        self
    }

    fn published(&self) -> Vec<ProgressUpdate> {
        self.published.lock().unwrap().clone()
    }
}

impl PlanningOracle for FakePorts {
    fn plan<'a>(&'a self, _goal: &'a str) -> PortFuture<'a, Vec<ProposedStep>> {
        Box::pin(async move {
            let delay = *self.plan_delay.lock().await;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.plan
                .lock()
                .await
                .clone()
                .ok_or_else(|| OracleError::Unavailable("planner offline".to_string()))
        })
    }
}

impl NavigationOracle for FakePorts {
    fn advise<'a>(&'a self, request: &'a NavigationRequest) -> PortFuture<'a, NavigationAdvice> {
        Box::pin(async move {
            let mut calls = self.advice_calls.lock().await;
            *calls = calls.saturating_add(1);
            drop(calls);
            Ok(NavigationAdvice {
                candidate: *self.candidate.lock().await,
                action: Some(request.step.kind.as_str().to_string()),
                request_attachment: *self.request_attachment.lock().await,
                findings: request
                    .step
                    .kind
                    .surveys()
                    .then(|| format!("basalt near {}", request.position)),
            })
        })
    }
}

impl AdvisoryOracle for FakePorts {
    fn review<'a>(&'a self, request: &'a AdvisoryRequest) -> PortFuture<'a, AdvisoryVerdict> {
        Box::pin(async move {
            let veto = *self.veto.lock().await;
            let vetoed = veto.filter(|veto| {
                veto.from.map_or(true, |from| from == request.current)
                    && veto.to.map_or(true, |to| to == request.proposed)
            });
            Ok(match vetoed {
                Some(Veto {
                    alternative: Some(alternative),
                    ..
                }) => AdvisoryVerdict::reject("dust storm", RiskLevel::Medium)
                    .with_alternative(alternative),
                Some(_) => AdvisoryVerdict::reject("dust storm", RiskLevel::High),
                None => AdvisoryVerdict::approve("clear skies"),
            })
        })
    }
}

impl EnrichmentProvider for FakePorts {
    fn environment<'a>(&'a self, _goal: &'a str) -> PortFuture<'a, Value> {
        Box::pin(async move {
            self.environment
                .lock()
                .await
                .clone()
                .ok_or_else(|| OracleError::Unavailable("no weather".to_string()))
        })
    }

    fn imagery(&self, _position: Position) -> PortFuture<'_, Url> {
        Box::pin(async move {
            self.imagery
                .lock()
                .await
                .clone()
                .ok_or_else(|| OracleError::Unavailable("no camera".to_string()))
        })
    }
}

impl MissionReporter for FakePorts {
    fn report<'a>(&'a self, snapshot: &'a MissionSnapshot) -> PortFuture<'a, MissionReport> {
        Box::pin(async move {
            if *self.reporter_fails.lock().await {
                return Err(OracleError::Malformed("reporter returned prose".to_string()));
            }
            let mut report = MissionReport::from_snapshot(snapshot);
            report.summary = format!("fake report: {}", report.summary);
            Ok(report)
        })
    }
}

impl ProgressSink for FakePorts {
    fn publish(&self, update: ProgressUpdate) {
        let mut published = self.published.lock().unwrap();
        published.push(update);
        let count = published.len();
        drop(published);
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if count >= *after {
                token.cancel();
            }
        }
    }
}

fn assert_ports_contract<T: MissionPorts>() {}

async fn service_with(
    ports: FakePorts,
    config: MissionConfig,
    goal: &str,
    obstacles: &[Position],
) -> (OrchestratorService<FakePorts>, MissionId) {
    let store = Arc::new(MissionStore::new());
    let mission = Mission::new(
        MissionId::new(),
        goal,
        config.grid(),
        ObstacleSet::new(obstacles.iter().copied()),
        config.rejection_window,
    );
    let id = store.create(mission).await;
    (OrchestratorService::new(ports, store, config), id)
}

fn ring_around(center: Position) -> Vec<Position> {
    [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)]
        .iter()
        .map(|(dx, dy)| center.offset(*dx, *dy))
        .collect()
}

fn messages(mission: &Mission) -> Vec<String> {
    mission.logs().iter().map(|log| log.message.clone()).collect()
}

#[test]
fn fake_ports_satisfy_contract() {
    assert_ports_contract::<FakePorts>();
    assert_ports_contract::<crate::oracles::LocalPorts>();
}

#[tokio::test]
async fn detours_around_obstacle_and_returns_home() {
    let ports = FakePorts::planning(Position::new(3, 3));
    let (service, id) = service_with(
        ports.clone(),
        MissionConfig::default(),
        "Go to (3,3)",
        &[Position::new(1, 1)],
    )
    .await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);
    assert!(outcome.report.summary.starts_with("fake report"));

    let mission = service.store().get(id).await.unwrap();
    assert_eq!(mission.rover_position(), Position::ORIGIN);
    assert!(mission.all_steps_complete());
    assert_eq!(
        mission.step_progress(0).unwrap().completed_at,
        Some(Position::new(3, 3))
    );
    assert!(!messages(&mission)
        .iter()
        .any(|m| m.contains("-> (1, 1)")));
    assert_eq!(
        mission.agent_states().get(&AgentKind::Reporter),
        Some(&AgentStatus::Complete)
    );
}

#[tokio::test]
async fn outbound_route_follows_resolver() {
    let ports = FakePorts::planning(Position::new(3, 3));
    let (service, id) = service_with(
        ports,
        MissionConfig::default(),
        "Go to (3,3)",
        &[Position::new(1, 1)],
    )
    .await;

    service.run(id, &CancellationToken::new()).await.unwrap();
    let mission = service.store().get(id).await.unwrap();
    let moves: Vec<String> = messages(&mission)
        .into_iter()
        .filter(|m| m.starts_with("Moved"))
        .take(5)
        .collect();
    assert_eq!(
        moves,
        vec![
            "Moved (0, 0) -> (1, 0) via resolver (advanced)",
            "Moved (1, 0) -> (2, 0) via resolver (advanced)",
            "Moved (2, 0) -> (2, 1) via resolver (advanced)",
            "Moved (2, 1) -> (2, 2) via resolver (advanced)",
            "Moved (2, 2) -> (3, 3) via resolver (advanced)",
        ]
    );
}

#[tokio::test]
async fn enclosed_target_aborts_and_walks_home() {
    let target = Position::new(5, 5);
    let ports = FakePorts::planning(target);
    let (service, id) = service_with(
        ports,
        MissionConfig::default(),
        "Go to (5,5)",
        &ring_around(target),
    )
    .await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Aborted);

    let mission = service.store().get(id).await.unwrap();
    assert_eq!(mission.rover_position(), Position::ORIGIN);
    assert!(!mission.step_progress(0).unwrap().completed);
    let logs = messages(&mission);
    assert!(logs.iter().any(|m| m.contains("(revisited)")));
    assert!(logs.iter().any(|m| m.starts_with("Emergency return")));
    assert!(mission
        .logs()
        .iter()
        .any(|log| log.level == LogLevel::Error && log.source == AgentKind::Supervisor));
}

#[tokio::test]
async fn advisory_veto_on_the_way_back_prevents_completion() {
    let target = Position::new(5, 5);
    let ports = FakePorts::planning(target)
        .with_veto(Veto {
            from: Some(target),
            to: None,
            alternative: None,
        })
        .await;
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (5,5)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Aborted);

    let mission = service.store().get(id).await.unwrap();
    assert!(mission.step_progress(0).unwrap().completed);
    assert!(!mission.step_progress(1).unwrap().completed);
    assert_eq!(mission.rover_position(), Position::ORIGIN);
    assert!(messages(&mission)
        .iter()
        .any(|m| m.contains("advisory rejection: dust storm")));
}

#[tokio::test]
async fn plausible_advisory_alternative_is_taken() {
    let ports = FakePorts::planning(Position::new(3, 3))
        .with_veto(Veto {
            from: Some(Position::ORIGIN),
            to: Some(Position::new(1, 1)),
            alternative: Some(Position::new(1, 0)),
        })
        .await;
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (3,3)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);

    let mission = service.store().get(id).await.unwrap();
    assert!(messages(&mission)
        .iter()
        .any(|m| m == "Moved (0, 0) -> (1, 0) via advisory (advanced)"));
}

#[tokio::test]
async fn implausible_navigator_suggestion_is_ignored() {
    let ports = FakePorts::planning(Position::new(2, 2))
        .with_candidate(Position::new(9, 9))
        .await;
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (2,2)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);
    let mission = service.store().get(id).await.unwrap();
    assert!(!messages(&mission).iter().any(|m| m.contains("(9, 9)")));
}

#[tokio::test]
async fn plausible_navigator_suggestion_is_used() {
    let ports = FakePorts::planning(Position::new(2, 0))
        .with_candidate(Position::new(1, 0))
        .await;
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (2,0)", &[]).await;

    service.run(id, &CancellationToken::new()).await.unwrap();
    let mission = service.store().get(id).await.unwrap();
    assert!(messages(&mission)
        .iter()
        .any(|m| m == "Moved (0, 0) -> (1, 0) via navigator (advanced)"));
}

#[tokio::test]
async fn cancellation_before_start_aborts_in_place() {
    let ports = FakePorts::planning(Position::new(3, 3));
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (3,3)", &[]).await;
    let token = CancellationToken::new();
    token.cancel();

    let outcome = service.run(id, &token).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Aborted);
    let mission = service.store().get(id).await.unwrap();
    assert_eq!(mission.rover_position(), Position::ORIGIN);
    assert!(mission.plan().is_empty());
}

#[tokio::test]
async fn cancellation_mid_mission_holds_position() {
    let token = CancellationToken::new();
    // three publishes during preparation, the fourth follows the first move
    let ports = FakePorts::planning(Position::new(3, 3)).cancelling_after(4, token.clone());
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (3,3)", &[]).await;

    let outcome = service.run(id, &token).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Aborted);
    assert_eq!(outcome.report.final_position, Position::new(1, 1));
    assert_eq!(
        outcome.report.outcome,
        "Mission aborted; rover holding at (1, 1)"
    );
    let mission = service.store().get(id).await.unwrap();
    assert_eq!(mission.rover_position(), Position::new(1, 1));
    assert!(!messages(&mission)
        .iter()
        .any(|m| m.starts_with("Emergency return")));
}

#[tokio::test]
async fn false_completions_are_reopened() {
    let (service, id) = service_with(
        FakePorts::new(),
        MissionConfig::default(),
        "Go to (3,3)",
        &[],
    )
    .await;
    let store = service.store();
    store
        .set_steps(
            id,
            MissionPlan::new([
                PlannedStep::new(1, StepKind::Move, Some(Position::new(3, 3)), "go"),
                PlannedStep::new(2, StepKind::Return, Some(Position::ORIGIN), "home"),
            ]),
        )
        .await
        .unwrap();
    // marked while the rover never left the origin
    store.update_step(id, 0, true, None).await.unwrap();
    store.set_current_step(id, 1).await.unwrap();

    let outcome = service.execute(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, ExecutionOutcome::Completed);

    let mission = store.get(id).await.unwrap();
    assert_eq!(mission.rover_position(), Position::ORIGIN);
    assert_eq!(
        mission.step_progress(0).unwrap().completed_at,
        Some(Position::new(3, 3))
    );
    assert!(messages(&mission)
        .iter()
        .any(|m| m.starts_with("False completion: step 1")));
}

#[tokio::test]
async fn runaway_loop_hits_iteration_cap() {
    let target = Position::new(5, 5);
    // a window narrower than the threshold can never trigger an abort
    let config = MissionConfig {
        rejection_threshold: 100,
        rejection_window: 20,
        ..MissionConfig::default()
    };
    let cap = config.iteration_cap(2);
    let (service, id) = service_with(
        FakePorts::planning(target),
        config,
        "Go to (5,5)",
        &ring_around(target),
    )
    .await;

    let result = service.run(id, &CancellationToken::new()).await;
    match result {
        Err(RoverError::IterationCapExceeded { cap: reported, .. }) => assert_eq!(reported, cap),
        other => panic!("expected iteration cap, got {other:?}"),
    }
    let mission = service.store().get(id).await.unwrap();
    assert_eq!(mission.status(), MissionStatus::Error);
}

#[tokio::test]
async fn planner_failure_uses_fallback_plan() {
    let (service, id) = service_with(
        FakePorts::new(),
        MissionConfig::default(),
        "Survey the crater at (2,2)",
        &[],
    )
    .await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);
    assert_eq!(outcome.report.total_steps, 3);
    assert_eq!(outcome.report.artifacts.len(), 1);
    assert_eq!(outcome.report.artifacts[0].kind, StepKind::Explore);
    assert_eq!(outcome.report.artifacts[0].position, Position::new(2, 2));
}

#[tokio::test]
async fn slow_planner_times_out_to_fallback() {
    let config = MissionConfig {
        oracle_timeout_ms: 20,
        ..MissionConfig::default()
    };
    let ports = FakePorts::planning(Position::new(1, 1))
        .with_plan_delay(Duration::from_secs(5))
        .await;
    let (service, id) = service_with(ports, config, "Inspect (1,1)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);
    let mission = service.store().get(id).await.unwrap();
    assert!(messages(&mission)
        .iter()
        .any(|m| m.starts_with("Planning oracle failed (oracle timed out")));
}

#[tokio::test]
async fn planner_output_is_corrected_and_logged() {
    let ports = FakePorts::new().with_plan_now(vec![
        ProposedStep::new("return", Some(Position::ORIGIN), "early"),
        ProposedStep::new("teleport", Some(Position::new(4, 4)), "???"),
        ProposedStep::new("scan", None, "scan the rock"),
    ]);
    let (service, id) = service_with(ports, MissionConfig::default(), "Scan (4,4)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);
    let mission = service.store().get(id).await.unwrap();
    let kinds: Vec<StepKind> = mission.plan().iter().map(PlannedStep::kind).collect();
    assert_eq!(kinds, vec![StepKind::Move, StepKind::Scan, StepKind::Return]);
    let corrections = mission
        .logs()
        .iter()
        .filter(|log| log.message.starts_with("Plan corrected"))
        .count();
    assert_eq!(corrections, 3);
}

#[tokio::test]
async fn imagery_attachments_are_deduplicated() {
    let ports = FakePorts::new()
        .with_plan_now(vec![
            ProposedStep::new("move", Some(Position::new(2, 2)), "go"),
            ProposedStep::new("scan", None, "scan"),
            ProposedStep::new("collect", None, "collect"),
            ProposedStep::new("return", Some(Position::ORIGIN), "home"),
        ])
        .with_imagery("https://imagery.example/tile/2-2.png")
        .await;
    let (service, id) = service_with(ports, MissionConfig::default(), "Scan (2,2)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);
    assert_eq!(outcome.report.attachments.len(), 1);

    let mission = service.store().get(id).await.unwrap();
    assert!(mission.steps().iter().all(|step| step.attachment.is_some()));
    assert_eq!(mission.artifacts().len(), 2);
}

#[tokio::test]
async fn environment_reaches_report() {
    let ports = FakePorts::planning(Position::new(1, 2))
        .with_environment(json!({"wind_kph": 40}))
        .await;
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (1,2)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.report.environment, Some(json!({"wind_kph": 40})));
}

#[tokio::test]
async fn reporter_failure_falls_back_to_summary() {
    let ports = FakePorts::planning(Position::new(1, 0))
        .with_reporter_failure()
        .await;
    let (service, id) = service_with(ports, MissionConfig::default(), "Go to (1,0)", &[]).await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Complete);
    assert!(outcome.report.summary.starts_with("Mission 'Go to (1,0)'"));
}

#[tokio::test]
async fn progress_is_published_throughout() {
    let ports = FakePorts::planning(Position::new(2, 2));
    let (service, id) =
        service_with(ports.clone(), MissionConfig::default(), "Go to (2,2)", &[]).await;

    service.run(id, &CancellationToken::new()).await.unwrap();
    let published = ports.published();
    assert!(published.len() > 4);
    assert!(published.iter().all(|update| update.mission_id == id));
    assert!(published
        .iter()
        .all(|update| update.recent_logs.len() <= MissionConfig::default().progress_log_tail));
    assert_eq!(
        published.last().map(|update| update.status),
        Some(MissionStatus::Complete)
    );
    assert!(*ports.advice_calls.lock().await > 0);
}

#[tokio::test]
async fn missing_mission_is_reported() {
    let (service, _) = service_with(
        FakePorts::new(),
        MissionConfig::default(),
        "Go to (1,1)",
        &[],
    )
    .await;
    let result = service.run(MissionId::new(), &CancellationToken::new()).await;
    assert!(matches!(result, Err(RoverError::MissionNotFound(_))));
}

#[tokio::test]
async fn boxed_in_rover_stalls_then_aborts() {
    let config = MissionConfig {
        rejection_threshold: 3,
        rejection_window: 5,
        ..MissionConfig::default()
    };
    let grid = Grid::new(config.grid_max);
    let walls: Vec<Position> = [(1, 0), (0, 1), (1, 1)]
        .iter()
        .map(|(x, y)| Position::new(*x, *y))
        .filter(|cell| grid.contains(*cell))
        .collect();
    let (service, id) = service_with(
        FakePorts::planning(Position::new(4, 4)),
        config,
        "Go to (4,4)",
        &walls,
    )
    .await;

    let outcome = service.run(id, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, MissionStatus::Aborted);
    let mission = service.store().get(id).await.unwrap();
    let stalls = messages(&mission)
        .iter()
        .filter(|m| m.starts_with("Stalled at (0, 0)"))
        .count();
    assert_eq!(stalls, 3);
}
