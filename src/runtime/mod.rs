//! Deterministic mission logic. Nothing here performs I/O or awaits.

pub mod completion;
pub mod emergency;
pub mod path;
pub mod plan;
pub mod rejection;
pub mod safety;

pub use completion::{false_completions, reconcile, step_reached, CompletionVerdict};
pub use emergency::emergency_return_path;
pub use path::{next_move, plausible_candidate, DEFAULT_DETOUR_SLACK};
pub use plan::{
    extract_goal_coordinates, fallback_plan, normalize_plan, NormalizedPlan, ProposedStep,
};
pub use rejection::{MovementEvent, RejectionWindow};
pub use safety::{validate, Admission, AdmissionReason, RiskLevel};
