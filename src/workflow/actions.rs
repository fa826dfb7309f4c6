//! Mutating workflow steps.
//!
//! Each action calls the backend, re-reads the status once the call has
//! succeeded, and only then advances the sequencer. While an action is pending
//! its trigger is reported as disabled and a second attempt is refused.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::errors::WorkflowError;
use super::notices::Notice;
use super::sequencer::{StepSequencer, WorkflowEvent, WorkflowState};
use super::slots::{SlotSelection, ToggleOutcome};
use super::status::{StatusSnapshot, WorkflowStatusClient};
use super::steps::{Role, StepName, StepVocabulary};
use crate::api::types::{
    Ack, AvailableSessions, GenerateScheduleRequest, Trainer, TrainerPreferences, TrainingSession,
};
use crate::api::WorkflowApi;
use crate::config::WorkflowConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Load,
    SelectBranch,
    ListTrainers,
    SelectTrainer,
    ListSessions,
    CreateSchedule,
    CompleteWorkflow,
}

impl ActionKind {
    /// Step whose UI hosts the action; `None` for actions valid at any step.
    pub fn step(self) -> Option<StepName> {
        match self {
            ActionKind::Load => None,
            ActionKind::SelectBranch => Some(StepName::SelectBranch),
            ActionKind::ListTrainers | ActionKind::SelectTrainer => Some(StepName::SelectTrainer),
            ActionKind::ListSessions | ActionKind::CreateSchedule => Some(StepName::CreateSchedule),
            ActionKind::CompleteWorkflow => Some(StepName::Completed),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Load => "load workflow status",
            ActionKind::SelectBranch => "select branch",
            ActionKind::ListTrainers => "list trainers",
            ActionKind::SelectTrainer => "select trainer",
            ActionKind::ListSessions => "list sessions",
            ActionKind::CreateSchedule => "create schedule",
            ActionKind::CompleteWorkflow => "complete workflow",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The workflow sits at `step` after the action.
    Step {
        step: StepName,
        index: usize,
        advanced: bool,
        notice: Option<Notice>,
    },
    /// Workflow completed on the backend; leave the workflow screen.
    Finished { notice: Option<Notice> },
    /// The workflow was detached while the request was in flight.
    Discarded,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks an action as pending until dropped.
struct InFlight<'a> {
    pending: &'a Mutex<HashSet<ActionKind>>,
    kind: ActionKind,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.kind);
    }
}

fn ack_notice(ack: Ack) -> Option<Notice> {
    ack.message
        .filter(|m| !m.trim().is_empty())
        .map(Notice::Backend)
}

/// Package activation workflow for one registration.
pub struct PackageWorkflow {
    registration_id: String,
    api: Arc<dyn WorkflowApi>,
    status_client: WorkflowStatusClient,
    sequencer: StepSequencer,
    state: Mutex<WorkflowState>,
    snapshot: Mutex<Option<StatusSnapshot>>,
    candidates: Mutex<AvailableSessions>,
    selection: Mutex<SlotSelection>,
    pending: Mutex<HashSet<ActionKind>>,
    attached: AtomicBool,
    settle_delay: Duration,
}

impl fmt::Debug for PackageWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageWorkflow")
            .field("registration_id", &self.registration_id)
            .field("state", &*lock(&self.state))
            .field("selected", &lock(&self.selection).len())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl PackageWorkflow {
    pub fn new(registration_id: impl Into<String>, api: Arc<dyn WorkflowApi>) -> Result<Self, WorkflowError> {
        let registration_id = registration_id.into();
        if registration_id.trim().is_empty() {
            return Err(WorkflowError::MissingRegistrationId);
        }

        Ok(Self {
            registration_id,
            status_client: WorkflowStatusClient::new(api.clone()),
            api,
            sequencer: StepSequencer::default(),
            state: Mutex::new(WorkflowState::default()),
            snapshot: Mutex::new(None),
            candidates: Mutex::new(AvailableSessions::default()),
            selection: Mutex::new(SlotSelection::new()),
            pending: Mutex::new(HashSet::new()),
            attached: AtomicBool::new(true),
            settle_delay: WorkflowConfig::default().schedule_settle_delay(),
        })
    }

    pub fn from_config(
        registration_id: impl Into<String>,
        api: Arc<dyn WorkflowApi>,
        config: &WorkflowConfig,
    ) -> Result<Self, WorkflowError> {
        Ok(Self::new(registration_id, api)?.with_settle_delay(config.schedule_settle_delay()))
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: StepVocabulary) -> Self {
        self.sequencer = StepSequencer::new(vocabulary);
        self
    }

    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }

    pub fn state(&self) -> WorkflowState {
        *lock(&self.state)
    }

    pub fn role(&self) -> Option<Role> {
        self.state().role
    }

    pub fn current_step(&self) -> Option<StepName> {
        self.sequencer.current_step(&self.state())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.sequencer.current_index(&self.state())
    }

    pub fn total_steps(&self) -> Option<usize> {
        self.sequencer.total_steps(&self.state())
    }

    pub fn step_names(&self) -> Vec<StepName> {
        self.role()
            .map(|role| self.sequencer.vocabulary().steps(role).to_vec())
            .unwrap_or_default()
    }

    /// Latest status read from the backend.
    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        lock(&self.snapshot).clone()
    }

    pub fn candidates(&self) -> AvailableSessions {
        lock(&self.candidates).clone()
    }

    pub fn selected_sessions(&self) -> Vec<TrainingSession> {
        lock(&self.selection).sessions().to_vec()
    }

    /// Whether the trigger for `kind` should be disabled.
    pub fn is_pending(&self, kind: ActionKind) -> bool {
        lock(&self.pending).contains(&kind)
    }

    /// The owning screen went away. Requests in flight still finish, but
    /// their results are no longer applied.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
        debug!(registration_id = %self.registration_id, "Workflow detached");
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn begin(&self, kind: ActionKind) -> Result<InFlight<'_>, WorkflowError> {
        let mut pending = lock(&self.pending);
        if !pending.insert(kind) {
            warn!(registration_id = %self.registration_id, action = %kind, "Action already in flight");
            return Err(WorkflowError::ActionInFlight(kind));
        }
        Ok(InFlight {
            pending: &self.pending,
            kind,
        })
    }

    /// Like `begin`, but only when nothing else is pending.
    fn begin_exclusive(&self, kind: ActionKind) -> Result<InFlight<'_>, WorkflowError> {
        let mut pending = lock(&self.pending);
        if let Some(busy) = pending.iter().next().copied() {
            warn!(
                registration_id = %self.registration_id,
                action = %kind,
                pending = %busy,
                "Refusing while another action is in flight"
            );
            return Err(WorkflowError::ActionInFlight(busy));
        }
        pending.insert(kind);
        Ok(InFlight {
            pending: &self.pending,
            kind,
        })
    }

    fn dispatch(&self, event: WorkflowEvent) -> WorkflowState {
        let mut state = lock(&self.state);
        let before = *state;
        *state = self.sequencer.reduce(before, event);
        if *state != before {
            info!(
                registration_id = %self.registration_id,
                from = ?before.phase,
                to = ?state.phase,
                event = ?event,
                "Workflow step transition"
            );
        }
        *state
    }

    /// Refuse actions that do not belong to the current step.
    fn guard_step(&self, kind: ActionKind) -> Result<(), WorkflowError> {
        let state = self.state();
        let role = state.role.ok_or(WorkflowError::NotLoaded)?;
        let Some(required) = kind.step() else {
            return Ok(());
        };

        if self.sequencer.vocabulary().index_of(role, required).is_none() {
            return Err(WorkflowError::NotApplicable { action: kind, role });
        }

        let current = self
            .sequencer
            .current_step(&state)
            .ok_or(WorkflowError::NotLoaded)?;
        if current != required {
            return Err(WorkflowError::StepMismatch {
                action: kind,
                current,
            });
        }
        Ok(())
    }

    fn step_outcome(&self, advanced: bool, notice: Option<Notice>) -> Result<ActionOutcome, WorkflowError> {
        let state = self.state();
        let step = self
            .sequencer
            .current_step(&state)
            .ok_or(WorkflowError::NotLoaded)?;
        let index = self
            .sequencer
            .current_index(&state)
            .ok_or(WorkflowError::NotLoaded)?;
        Ok(ActionOutcome::Step {
            step,
            index,
            advanced,
            notice,
        })
    }

    /// Re-read the status and feed it to the sequencer.
    /// Returns `None` when the workflow was detached meanwhile.
    async fn refresh_status(&self) -> Result<Option<StatusSnapshot>, WorkflowError> {
        let snapshot = self.status_client.fetch_status(&self.registration_id).await?;
        if !self.is_attached() {
            return Ok(None);
        }
        *lock(&self.snapshot) = Some(snapshot.clone());
        self.dispatch(WorkflowEvent::StatusLoaded(snapshot.signal()));
        Ok(Some(snapshot))
    }

    /// Fetch the status and pick the step to show. Only the first successful
    /// load chooses the step; later loads leave it alone.
    pub async fn load(&self) -> Result<ActionOutcome, WorkflowError> {
        let _in_flight = self.begin(ActionKind::Load)?;
        self.load_status().await
    }

    /// Forget the current step and choose it again from a fresh status.
    /// Refused while any action is pending, so an action's own status read can
    /// never be taken for the initial load.
    pub async fn reload(&self) -> Result<ActionOutcome, WorkflowError> {
        let _in_flight = self.begin_exclusive(ActionKind::Load)?;
        self.dispatch(WorkflowEvent::Reload);
        self.load_status().await
    }

    async fn load_status(&self) -> Result<ActionOutcome, WorkflowError> {
        match self.refresh_status().await {
            Ok(Some(_)) => self.step_outcome(false, None),
            Ok(None) => Ok(ActionOutcome::Discarded),
            Err(err) => {
                warn!(
                    registration_id = %self.registration_id,
                    error = %err,
                    retryable = !err.is_fatal(),
                    "Could not load workflow status"
                );
                Err(err)
            }
        }
    }

    pub async fn select_branch(&self, branch_id: &str) -> Result<ActionOutcome, WorkflowError> {
        let _in_flight = self.begin(ActionKind::SelectBranch)?;
        self.guard_step(ActionKind::SelectBranch)?;

        let ack = self.api.update_branch(&self.registration_id, branch_id).await?;
        if !self.is_attached() {
            return Ok(ActionOutcome::Discarded);
        }
        if self.refresh_status().await?.is_none() {
            return Ok(ActionOutcome::Discarded);
        }

        self.dispatch(WorkflowEvent::BranchConfirmed);
        info!(registration_id = %self.registration_id, branch_id, "Branch confirmed");
        self.step_outcome(true, ack_notice(ack))
    }

    fn validate_preferences(preferences: &TrainerPreferences) -> Result<(), WorkflowError> {
        if !(1..=7).contains(&preferences.days_per_week) {
            return Err(WorkflowError::InvalidPreferences(format!(
                "{} training days per week is outside 1-7",
                preferences.days_per_week
            )));
        }
        if preferences.preferred_hours.iter().all(|h| h.trim().is_empty()) {
            return Err(WorkflowError::InvalidPreferences(
                "pick at least one preferred time window".to_string(),
            ));
        }
        Ok(())
    }

    fn require_branch(&self) -> Result<(), WorkflowError> {
        match lock(&self.snapshot).as_ref() {
            Some(snapshot) if snapshot.has_branch() => Ok(()),
            Some(_) => Err(WorkflowError::BranchRequired),
            None => Err(WorkflowError::NotLoaded),
        }
    }

    pub async fn available_trainers(
        &self,
        preferences: &TrainerPreferences,
    ) -> Result<Vec<Trainer>, WorkflowError> {
        let _in_flight = self.begin(ActionKind::ListTrainers)?;
        self.guard_step(ActionKind::ListTrainers)?;
        self.require_branch()?;
        Self::validate_preferences(preferences)?;

        let trainers = self
            .api
            .available_trainers(&self.registration_id, preferences)
            .await?;
        debug!(registration_id = %self.registration_id, count = trainers.len(), "Trainers fetched");
        Ok(trainers)
    }

    pub async fn select_trainer(
        &self,
        trainer_id: &str,
        preferences: &TrainerPreferences,
    ) -> Result<ActionOutcome, WorkflowError> {
        let _in_flight = self.begin(ActionKind::SelectTrainer)?;
        self.guard_step(ActionKind::SelectTrainer)?;
        self.require_branch()?;
        Self::validate_preferences(preferences)?;

        let ack = self
            .api
            .select_trainer(&self.registration_id, trainer_id, preferences)
            .await?;
        if !self.is_attached() {
            return Ok(ActionOutcome::Discarded);
        }
        let Some(snapshot) = self.refresh_status().await? else {
            return Ok(ActionOutcome::Discarded);
        };

        // A status that is already terminal must not be advanced past.
        if snapshot.is_terminal() {
            info!(
                registration_id = %self.registration_id,
                "Status already completed after trainer selection, not advancing"
            );
            return self.step_outcome(false, ack_notice(ack));
        }

        self.dispatch(WorkflowEvent::StepCompleted);
        info!(registration_id = %self.registration_id, trainer_id, "Trainer confirmed");
        self.step_outcome(true, ack_notice(ack))
    }

    /// Fetch candidate sessions and keep them for selection.
    pub async fn available_sessions(&self) -> Result<AvailableSessions, WorkflowError> {
        let _in_flight = self.begin(ActionKind::ListSessions)?;
        self.guard_step(ActionKind::ListSessions)?;

        let sessions = self.api.available_sessions(&self.registration_id).await?;
        if self.is_attached() {
            *lock(&self.candidates) = sessions.clone();
        }
        debug!(
            registration_id = %self.registration_id,
            count = sessions.sessions.len(),
            "Candidate sessions fetched"
        );
        Ok(sessions)
    }

    pub fn toggle_session(&self, session: &TrainingSession) -> ToggleOutcome {
        lock(&self.selection).toggle(session)
    }

    /// Toggle a candidate from the last `available_sessions` result by id.
    pub fn toggle_session_by_id(&self, session_id: &str) -> Result<ToggleOutcome, WorkflowError> {
        let session = lock(&self.candidates)
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownSession(session_id.to_string()))?;
        Ok(self.toggle_session(&session))
    }

    pub fn remove_session(&self, session_id: &str) -> bool {
        lock(&self.selection).remove(session_id)
    }

    /// Submit the selected sessions. A 409 still advances the workflow and is
    /// reported as a notice.
    pub async fn create_schedule(&self) -> Result<ActionOutcome, WorkflowError> {
        let _in_flight = self.begin(ActionKind::CreateSchedule)?;
        self.guard_step(ActionKind::CreateSchedule)?;

        let entries = lock(&self.selection).payload();
        if entries.is_empty() {
            return Err(WorkflowError::Rejected(Notice::SelectAtLeastOneSession));
        }
        let request = GenerateScheduleRequest::from(entries);

        let notice = match self.api.generate_schedule(&self.registration_id, &request).await {
            Ok(ack) => ack_notice(ack),
            Err(err) if err.is_conflict() => {
                warn!(
                    registration_id = %self.registration_id,
                    error = %err,
                    "Schedule conflict, advancing anyway"
                );
                Some(Notice::ScheduleConflict {
                    message: err.user_message(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        if !self.is_attached() {
            return Ok(ActionOutcome::Discarded);
        }

        lock(&self.selection).clear();
        tokio::time::sleep(self.settle_delay).await;
        if self.refresh_status().await?.is_none() {
            return Ok(ActionOutcome::Discarded);
        }

        self.dispatch(WorkflowEvent::StepCompleted);
        info!(
            registration_id = %self.registration_id,
            sessions = request.entries.len(),
            "Schedule created"
        );
        self.step_outcome(true, notice)
    }

    pub async fn complete_workflow(&self) -> Result<ActionOutcome, WorkflowError> {
        let _in_flight = self.begin(ActionKind::CompleteWorkflow)?;
        self.guard_step(ActionKind::CompleteWorkflow)?;

        let ack = self.api.complete_workflow(&self.registration_id).await?;
        if !self.is_attached() {
            return Ok(ActionOutcome::Discarded);
        }
        info!(registration_id = %self.registration_id, "Package workflow finished");
        Ok(ActionOutcome::Finished {
            notice: ack_notice(ack),
        })
    }
}
