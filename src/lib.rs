// Gym Workflow Library - package activation workflow client
// Exposes the workflow engine, the backend client and ambient setup

pub mod api;
pub mod config;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use api::{ApiError, ErrorCategory, HttpWorkflowApi, WorkflowApi};
pub use config::{config, init_config, GymWorkflowConfig};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    ActionKind, ActionOutcome, Notice, PackageWorkflow, Role, SlotSelection, StepName,
    StepSequencer, StepVocabulary, TimeSlot, ToggleOutcome, WorkflowError, WorkflowEvent,
    WorkflowPhase, WorkflowState, WorkflowStatusClient,
};
