#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::types::{Grid, ObstacleSet, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for RiskLevel {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("Unknown risk level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionReason {
    Clear,
    OutOfBounds,
    Obstacle,
    AdvisoryRejected,
}

impl AdmissionReason {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::OutOfBounds => "out_of_bounds",
            Self::Obstacle => "obstacle",
            Self::AdvisoryRejected => "advisory_rejected",
        }
    }
}

/// Verdict on one proposed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    approved: bool,
    reason: AdmissionReason,
    detail: String,
    risk: RiskLevel,
}

impl Admission {
    #[must_use]
    pub fn approved(detail: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: AdmissionReason::Clear,
            detail: detail.into(),
            risk: RiskLevel::Low,
        }
    }

    #[must_use]
    pub fn rejected(reason: AdmissionReason, detail: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            approved: false,
            reason,
            detail: detail.into(),
            risk,
        }
    }

    #[must_use]
    pub const fn is_approved(&self) -> bool {
        self.approved
    }

    #[must_use]
    pub const fn reason(&self) -> AdmissionReason {
        self.reason
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    #[must_use]
    pub const fn risk(&self) -> RiskLevel {
        self.risk
    }

    /// Folds an advisory opinion into a deterministic verdict.
    ///
    /// An advisory rejection turns an approval into a rejection. An advisory
    /// approval never changes anything.
    #[must_use]
    pub fn tighten(self, advisory_approved: bool, advisory_reason: &str, risk: RiskLevel) -> Self {
        if !self.approved || advisory_approved {
            return self;
        }
        Self::rejected(
            AdmissionReason::AdvisoryRejected,
            format!("advisory rejection: {advisory_reason}"),
            risk,
        )
    }
}

/// Deterministic admissibility check for a single proposed cell.
#[must_use]
pub fn validate(
    current: Position,
    proposed: Position,
    obstacles: &ObstacleSet,
    grid: Grid,
) -> Admission {
    if !grid.contains(proposed) {
        return Admission::rejected(
            AdmissionReason::OutOfBounds,
            format!("out of bounds: {proposed}"),
            RiskLevel::High,
        );
    }

    if obstacles.contains(proposed) {
        return Admission::rejected(
            AdmissionReason::Obstacle,
            format!("obstacle at position {proposed}"),
            RiskLevel::High,
        );
    }

    Admission::approved(format!("move {current} -> {proposed} is clear"))
}
