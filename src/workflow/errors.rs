use thiserror::Error;

use super::actions::ActionKind;
use super::notices::Notice;
use super::steps::{Role, StepName};
use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Fatal: the screen was opened without a registration.
    #[error("Registration id is missing")]
    MissingRegistrationId,

    #[error("Workflow status has not been loaded yet")]
    NotLoaded,

    #[error("{action} is not part of the {role:?} workflow")]
    NotApplicable { action: ActionKind, role: Role },

    #[error("Cannot {action} while the workflow is at step {current}")]
    StepMismatch { action: ActionKind, current: StepName },

    #[error("{0} is already in progress")]
    ActionInFlight(ActionKind),

    #[error("A branch must be selected before choosing a trainer")]
    BranchRequired,

    #[error("Invalid training preferences: {0}")]
    InvalidPreferences(String),

    #[error("Session {0} is not among the available sessions")]
    UnknownSession(String),

    /// Rejected locally before reaching the backend.
    #[error("{0}")]
    Rejected(Notice),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl WorkflowError {
    /// Only a missing registration id leaves nothing to retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkflowError::MissingRegistrationId)
    }

    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Api(err) => err.user_message(),
            WorkflowError::Rejected(notice) => notice.to_string(),
            other => other.to_string(),
        }
    }
}
