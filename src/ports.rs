#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::error::OracleError;
use crate::report::MissionReport;
use crate::runtime::{ProposedStep, RiskLevel};
use crate::types::{MissionSnapshot, ObstacleSet, Position, ProgressUpdate, Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// Boxed future returned by every external collaborator.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OracleError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub step: Step,
    pub position: Position,
    pub obstacles: ObstacleSet,
    pub goal: String,
}

/// Untrusted suggestion for the next move and any findings on the way.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationAdvice {
    pub candidate: Option<Position>,
    pub action: Option<String>,
    #[serde(default)]
    pub request_attachment: bool,
    pub findings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub current: Position,
    pub proposed: Position,
    pub obstacles: ObstacleSet,
    pub environment: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryVerdict {
    pub approved: bool,
    pub reason: String,
    pub alternative: Option<Position>,
    pub risk: RiskLevel,
}

impl AdvisoryVerdict {
    #[must_use]
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: reason.into(),
            alternative: None,
            risk: RiskLevel::Low,
        }
    }

    #[must_use]
    pub fn reject(reason: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            alternative: None,
            risk,
        }
    }

    #[must_use]
    pub const fn with_alternative(mut self, alternative: Position) -> Self {
        self.alternative = Some(alternative);
        self
    }
}

pub trait PlanningOracle {
    fn plan<'a>(&'a self, goal: &'a str) -> PortFuture<'a, Vec<ProposedStep>>;
}

pub trait NavigationOracle {
    fn advise<'a>(&'a self, request: &'a NavigationRequest) -> PortFuture<'a, NavigationAdvice>;
}

/// Narrative second opinion on an already admitted move.
pub trait AdvisoryOracle {
    fn review<'a>(&'a self, request: &'a AdvisoryRequest) -> PortFuture<'a, AdvisoryVerdict>;
}

/// Opaque context (weather and similar) and imagery.
pub trait EnrichmentProvider {
    fn environment<'a>(&'a self, goal: &'a str) -> PortFuture<'a, Value>;

    fn imagery(&self, position: Position) -> PortFuture<'_, Url>;
}

pub trait MissionReporter {
    fn report<'a>(&'a self, snapshot: &'a MissionSnapshot) -> PortFuture<'a, MissionReport>;
}

/// Fire-and-forget progress fan-out. Must never block.
pub trait ProgressSink {
    fn publish(&self, update: ProgressUpdate);
}

pub trait MissionPorts:
    PlanningOracle
    + NavigationOracle
    + AdvisoryOracle
    + EnrichmentProvider
    + MissionReporter
    + ProgressSink
{
}

impl<T> MissionPorts for T where
    T: PlanningOracle
        + NavigationOracle
        + AdvisoryOracle
        + EnrichmentProvider
        + MissionReporter
        + ProgressSink
{
}

/// Awaits an oracle call for at most `limit`; elapsed time becomes
/// `OracleError::Timeout`.
///
/// # Errors
/// Returns the oracle's own error or a timeout.
pub async fn bounded<T>(limit: Duration, call: PortFuture<'_, T>) -> Result<T, OracleError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout {
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
