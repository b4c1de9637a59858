#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible mission lifecycle.
///
/// `Pending -> Planning -> Executing -> {Complete, Aborted, Error}`. Any
/// non-terminal state may also drop straight to `Aborted` (cancellation) or
/// `Error` (lost record). Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
    Planning,
    Executing,
    Complete,
    Aborted,
    Error,
}

impl MissionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Aborted | Self::Error)
    }

    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Complete | Self::Aborted | Self::Error, _) => false,
            (_, Self::Aborted | Self::Error)
            | (Self::Pending, Self::Planning)
            | (Self::Planning, Self::Executing)
            | (Self::Executing, Self::Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for MissionStatus {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s {
            "pending" => Ok(Self::Pending),
            "planning" => Ok(Self::Planning),
            "executing" => Ok(Self::Executing),
            "complete" => Ok(Self::Complete),
            "aborted" => Ok(Self::Aborted),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown mission status: {s}")),
        }
    }
}

/// Logical role that produced a log entry or owns a status slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Planner,
    Rover,
    Safety,
    Reporter,
    Supervisor,
    System,
}

impl AgentKind {
    /// Roles that carry a status slot in progress snapshots.
    pub const TRACKED: [Self; 5] = [
        Self::Planner,
        Self::Rover,
        Self::Safety,
        Self::Reporter,
        Self::Supervisor,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Rover => "rover",
            Self::Safety => "safety",
            Self::Reporter => "reporter",
            Self::Supervisor => "supervisor",
            Self::System => "system",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AgentKind {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s {
            "planner" => Ok(Self::Planner),
            "rover" => Ok(Self::Rover),
            "safety" => Ok(Self::Safety),
            "reporter" => Ok(Self::Reporter),
            "supervisor" => Ok(Self::Supervisor),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown agent kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Planning,
    Executing,
    Validating,
    Reporting,
    Complete,
    Error,
}

impl AgentStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Validating => "validating",
            Self::Reporting => "reporting",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AgentStatus {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s {
            "idle" => Ok(Self::Idle),
            "planning" => Ok(Self::Planning),
            "executing" => Ok(Self::Executing),
            "validating" => Ok(Self::Validating),
            "reporting" => Ok(Self::Reporting),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mission_status_roundtrip_preserves_values() {
        let cases = [
            (MissionStatus::Pending, "pending"),
            (MissionStatus::Planning, "planning"),
            (MissionStatus::Executing, "executing"),
            (MissionStatus::Complete, "complete"),
            (MissionStatus::Aborted, "aborted"),
            (MissionStatus::Error, "error"),
        ];

        for (status, text) in cases {
            assert_eq!(status.as_str(), text);
            assert_eq!(MissionStatus::try_from(text), Ok(status));
        }
    }

    #[test]
    fn terminal_statuses_are_sticky() {
        for terminal in [
            MissionStatus::Complete,
            MissionStatus::Aborted,
            MissionStatus::Error,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(MissionStatus::Executing));
            assert!(!terminal.can_transition_to(MissionStatus::Aborted));
            assert!(!terminal.can_transition_to(MissionStatus::Complete));
        }
    }

    #[test]
    fn lifecycle_only_moves_forward() {
        assert!(MissionStatus::Pending.can_transition_to(MissionStatus::Planning));
        assert!(MissionStatus::Planning.can_transition_to(MissionStatus::Executing));
        assert!(MissionStatus::Executing.can_transition_to(MissionStatus::Complete));
        assert!(MissionStatus::Pending.can_transition_to(MissionStatus::Aborted));
        assert!(!MissionStatus::Pending.can_transition_to(MissionStatus::Complete));
        assert!(!MissionStatus::Executing.can_transition_to(MissionStatus::Planning));
    }

    #[test]
    fn agent_kind_rejects_unknown_names() {
        assert_eq!(AgentKind::try_from("rover"), Ok(AgentKind::Rover));
        assert!(AgentKind::try_from("pilot").is_err());
        assert_eq!(AgentStatus::try_from("validating"), Ok(AgentStatus::Validating));
    }
}
