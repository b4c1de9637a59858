#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use thiserror::Error;

/// Error code constants for type-safe error handling
pub mod code {
    pub const CLI_ERROR: &str = "CLI_ERROR";
    pub const NOTFOUND: &str = "NOTFOUND";
    pub const INVALID: &str = "INVALID";
    pub const EXHAUSTED: &str = "EXHAUSTED";
    pub const CANCELLED: &str = "CANCELLED";
    pub const DEPENDENCY: &str = "DEPENDENCY";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Failure reported by an external decision source.
///
/// Always recoverable: the orchestrator substitutes a deterministic fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle returned malformed response: {0}")]
    Malformed(String),

    #[error("oracle timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

#[derive(Error, Debug)]
pub enum RoverError {
    #[error("Mission not found: {0}")]
    MissionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Iteration cap of {cap} exceeded for mission {mission_id}")]
    IterationCapExceeded { mission_id: String, cap: usize },

    #[error("Mission {0} cancelled")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoverError {
    /// Returns the protocol error code for this error
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissionNotFound(_) => code::NOTFOUND,
            Self::Config(_) | Self::InvalidPlan(_) | Self::Serialization(_) | Self::Toml(_) => {
                code::INVALID
            }
            Self::IterationCapExceeded { .. } => code::EXHAUSTED,
            Self::Cancelled(_) => code::CANCELLED,
            Self::Io(_) => code::DEPENDENCY,
            Self::Internal(_) => code::INTERNAL,
        }
    }

    /// Returns the exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Toml(_) => 2,
            Self::MissionNotFound(_) => 3,
            Self::InvalidPlan(_) => 4,
            Self::IterationCapExceeded { .. } => 6,
            Self::Io(_) => 7,
            Self::Serialization(_) => 8,
            Self::Internal(_) => 9,
            Self::Cancelled(_) => 10,
        }
    }
}

/// Protocol error codes as documented in the CLI
pub const ERROR_CODES: &[(&str, &str, &str)] = &[
    (
        code::CLI_ERROR,
        "Invalid CLI usage",
        "Run 'rover --help' for valid options",
    ),
    (
        code::NOTFOUND,
        "Mission record was not found",
        "Check the mission id; records do not survive restarts",
    ),
    (
        code::INVALID,
        "Invalid configuration or plan",
        "Validate the TOML config and goal text",
    ),
    (
        code::EXHAUSTED,
        "Mission exceeded its iteration cap",
        "Inspect obstacle layout and raise iteration_margin",
    ),
    (
        code::CANCELLED,
        "Mission was cancelled",
        "Start a new mission",
    ),
    (
        code::DEPENDENCY,
        "Filesystem or system dependency failed",
        "Check file paths and permissions",
    ),
    (
        code::INTERNAL,
        "Unexpected internal failure",
        "Inspect logs and retry",
    ),
];

/// Get error code details (description and fix) for a given error code
#[must_use]
pub fn get_error_info(error_code: &str) -> Option<(&'static str, &'static str)> {
    ERROR_CODES
        .iter()
        .find(|(code, _, _)| *code == error_code)
        .map(|(_, desc, fix)| (*desc, *fix))
}

pub type Result<T> = std::result::Result<T, RoverError>;

#[cfg(test)]
mod tests {
    use super::{code, get_error_info, RoverError};

    #[test]
    fn every_error_code_has_documentation() {
        let errors = [
            RoverError::MissionNotFound("m".to_string()),
            RoverError::Config("bad".to_string()),
            RoverError::Io(std::io::Error::other("disk gone")),
            RoverError::IterationCapExceeded {
                mission_id: "m".to_string(),
                cap: 10,
            },
            RoverError::Cancelled("m".to_string()),
            RoverError::Internal("x".to_string()),
        ];

        for err in &errors {
            assert!(get_error_info(err.code()).is_some(), "{}", err.code());
        }
    }

    #[test]
    fn io_failure_maps_to_dependency_code() {
        let err = RoverError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "config.toml",
        ));
        assert_eq!(err.code(), code::DEPENDENCY);
        assert_eq!(err.exit_code(), 7);
        assert_eq!(err.to_string(), "IO error: config.toml");
    }
}
