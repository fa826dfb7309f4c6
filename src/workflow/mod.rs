// Package activation workflow engine.
// Sequencing is a pure reducer; actions wrap it with backend calls.

pub mod actions;
pub mod errors;
pub mod notices;
pub mod sequencer;
pub mod slots;
pub mod status;
pub mod steps;

pub use actions::{ActionKind, ActionOutcome, PackageWorkflow};
pub use errors::WorkflowError;
pub use notices::Notice;
pub use sequencer::{StatusSignal, StepSequencer, WorkflowEvent, WorkflowPhase, WorkflowState};
pub use slots::{build_schedule_payload, sessions_for_slot, SessionBoard, SlotSelection, TimeSlot, ToggleOutcome};
pub use status::{StatusSnapshot, WorkflowStatusClient};
pub use steps::{Role, StepName, StepVocabulary};
