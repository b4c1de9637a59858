mod grid;
mod identifiers;
mod mission;
mod status;
mod step;

pub use grid::{Grid, ObstacleSet, Position, GRID_MAX};
pub use identifiers::MissionId;
pub use mission::{
    CollectedArtifact, LogEntry, Mission, MissionSnapshot, MissionSummary, ProgressUpdate,
};
pub use status::{AgentKind, AgentStatus, LogLevel, MissionStatus};
pub use step::{MissionPlan, PlannedStep, Step, StepKind, StepProgress};
