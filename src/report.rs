use crate::types::{CollectedArtifact, MissionId, MissionSnapshot, MissionStatus, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Final, externally presented account of one mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionReport {
    pub mission_id: MissionId,
    pub goal: String,
    pub status: MissionStatus,
    pub summary: String,
    pub outcome: String,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub final_position: Position,
    pub artifacts: Vec<CollectedArtifact>,
    pub attachments: Vec<Url>,
    pub environment: Option<Value>,
    pub duration_ms: i64,
    pub generated_at: DateTime<Utc>,
}

impl MissionReport {
    #[must_use]
    pub fn from_snapshot(snapshot: &MissionSnapshot) -> Self {
        let completed_steps = snapshot.steps.iter().filter(|step| step.completed).count();
        let total_steps = snapshot.steps.len();
        let generated_at = Utc::now();

        let summary = format!(
            "Mission '{}' {}: {completed_steps}/{total_steps} steps completed, rover at {}, {} finding(s) collected",
            snapshot.goal,
            snapshot.status,
            snapshot.rover_position,
            snapshot.artifacts.len(),
        );

        Self {
            mission_id: snapshot.id,
            goal: snapshot.goal.clone(),
            status: snapshot.status,
            summary,
            outcome: outcome_text(snapshot),
            completed_steps,
            total_steps,
            final_position: snapshot.rover_position,
            artifacts: snapshot.artifacts.clone(),
            attachments: snapshot.attachments.clone(),
            environment: snapshot.environment.clone(),
            duration_ms: (snapshot.updated_at - snapshot.created_at).num_milliseconds(),
            generated_at,
        }
    }
}

fn outcome_text(snapshot: &MissionSnapshot) -> String {
    match snapshot.status {
        MissionStatus::Complete => "All objectives met and rover returned to base".to_string(),
        MissionStatus::Aborted if snapshot.rover_position.is_origin() => {
            "Mission aborted; rover recalled to base".to_string()
        }
        MissionStatus::Aborted => format!(
            "Mission aborted; rover holding at {}",
            snapshot.rover_position
        ),
        MissionStatus::Error => "Mission terminated by an internal error".to_string(),
        MissionStatus::Pending | MissionStatus::Planning | MissionStatus::Executing => {
            "Mission still in progress".to_string()
        }
    }
}
