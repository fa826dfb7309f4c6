use std::sync::Arc;

use tracing::{debug, warn};

use super::errors::WorkflowError;
use super::sequencer::StatusSignal;
use super::steps::{Role, StepName};
use crate::api::types::{Registration, WorkflowStatusData, WorkflowStepInfo};
use crate::api::{ApiError, WorkflowApi};

/// Normalized result of `workflow-status/{registrationId}`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub registration: Registration,
    pub is_owner: bool,
    /// Reported step, `None` when absent or outside the vocabulary.
    pub current_step: Option<StepName>,
    pub raw_current_step: Option<String>,
    pub workflow_steps: Vec<WorkflowStepInfo>,
}

impl StatusSnapshot {
    pub fn role(&self) -> Role {
        Role::from_is_owner(self.is_owner)
    }

    pub fn signal(&self) -> StatusSignal {
        StatusSignal {
            role: self.role(),
            reported_step: self.current_step,
            registration_completed: self.registration.status.is_completed(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.signal().is_terminal()
    }

    pub fn has_branch(&self) -> bool {
        self.registration.branch.is_some()
    }
}

impl From<WorkflowStatusData> for StatusSnapshot {
    fn from(data: WorkflowStatusData) -> Self {
        let current_step = data.current_step.as_deref().and_then(StepName::parse);
        if current_step.is_none() {
            if let Some(raw) = &data.current_step {
                warn!(step = %raw, "Backend reported an unknown workflow step");
            }
        }

        Self {
            registration: data.registration,
            is_owner: data.is_owner,
            current_step,
            raw_current_step: data.current_step,
            workflow_steps: data.workflow_steps,
        }
    }
}

/// Reads workflow status; never touches workflow state itself.
#[derive(Clone)]
pub struct WorkflowStatusClient {
    api: Arc<dyn WorkflowApi>,
}

impl WorkflowStatusClient {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self { api }
    }

    pub async fn fetch_status(&self, registration_id: &str) -> Result<StatusSnapshot, WorkflowError> {
        if registration_id.trim().is_empty() {
            return Err(WorkflowError::MissingRegistrationId);
        }

        let envelope = self.api.workflow_status(registration_id).await?;
        match envelope.success {
            Some(true) => {}
            Some(false) => {
                return Err(ApiError::Rejected {
                    status: None,
                    message: envelope.message,
                }
                .into())
            }
            None => return Err(ApiError::malformed("missing success flag").into()),
        }

        let data = envelope
            .data
            .ok_or_else(|| ApiError::malformed("workflow status without data"))?;
        let data: WorkflowStatusData = serde_json::from_value(data)
            .map_err(|e| ApiError::malformed(format!("workflow status: {e}")))?;

        let snapshot = StatusSnapshot::from(data);
        debug!(
            registration_id,
            is_owner = snapshot.is_owner,
            step = ?snapshot.current_step,
            status = snapshot.registration.status.as_str(),
            "Workflow status fetched"
        );
        Ok(snapshot)
    }
}
