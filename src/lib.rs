pub mod config;
pub mod error;
pub mod logging;
pub mod oracles;
pub mod orchestrator_service;
pub mod ports;
pub mod report;
pub mod runtime;
pub mod service;
pub mod store;
pub mod types;

pub use config::MissionConfig;
pub use error::{OracleError, Result, RoverError};
pub use orchestrator_service::{ExecutionOutcome, MissionOutcome, OrchestratorService};
pub use report::MissionReport;
pub use service::{MissionHandle, MissionRequest, MissionService, ObstacleSource};
pub use store::MissionStore;
pub use types::*;
